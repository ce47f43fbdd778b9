use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{FixedOffset, NaiveDateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode};
use teloxide::utils::command::BotCommands;

use crate::brag::{self, html_escape, split_message, BragDocument, TELEGRAM_CHUNK};
use crate::config::BotConfig;
use crate::db::{Activity, Database, User};
use crate::error::AppError;
use crate::llm::{self, LlmClient};
use crate::nlu::{Intent, IntentClassifier};
use crate::{pdf, timeparse};

const MAX_DAYS: u32 = 365;
const LIST_LIMIT: usize = 10;

/// Comandos do bot.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Comandos do Bragfy")]
pub enum Command {
    #[command(description = "começar a usar o Bragfy")]
    Start,
    #[command(description = "ajuda")]
    Help,
    #[command(description = "gerar Brag Document (ex: /brag 30)")]
    Brag(String),
    #[command(description = "Brag Document em texto (ex: /texto 7)")]
    Texto(String),
    #[command(description = "Brag Document em PDF (ex: /pdf 30)")]
    Pdf(String),
    #[command(description = "resumo com IA (ex: /resumo 14)")]
    Resumo(String),
    #[command(description = "últimas atividades registradas")]
    Atividades,
    #[command(description = "apagar a última atividade")]
    Desfazer,
    #[command(description = "estatísticas")]
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BragFormat {
    Text,
    Pdf,
    Ai,
}

impl BragFormat {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Ai => "ai",
        }
    }

    pub fn from_str_tag(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

/// Tudo que o bot sabe fazer; comandos, intents e botões caem aqui.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Start,
    Help,
    Greeting,
    Picker(u32),
    Brag(BragFormat, u32),
    List,
    Undo,
    Status,
}

/// Estado compartilhado pelos handlers.
pub struct BotState {
    pub db: Arc<Mutex<Database>>,
    pub nlu: IntentClassifier,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub cfg: BotConfig,
}

impl BotState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Horário local do usuário (offset fixo configurado).
    pub fn now(&self) -> NaiveDateTime {
        local_now(self.cfg.timezone_offset_hours)
    }

    /// Todo update registra/atualiza o usuário.
    fn register(&self, from: &teloxide::types::User) -> Result<User, AppError> {
        self.db().upsert_user(
            from.id.0 as i64,
            &from.first_name,
            from.last_name.as_deref(),
            from.username.as_deref(),
        )
    }

    /// Brag Document dos últimos `days` dias, incluindo hoje.
    pub fn build_document(&self, user: &User, days: u32) -> Result<BragDocument, AppError> {
        brag::collect(&self.db(), user, days, self.now())
    }
}

pub fn local_now(offset_hours: i32) -> NaiveDateTime {
    match FixedOffset::east_opt(offset_hours * 3600) {
        Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
        None => Utc::now().naive_utc(),
    }
}

/// Command handler.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let Some(from) = msg.from.as_ref() else {
        bot.send_message(chat_id, "\u{26a0}\u{fe0f} Use o Bragfy em uma conversa privada.")
            .await?;
        return Ok(());
    };

    let user = match state.register(from) {
        Ok(u) => u,
        Err(e) => return reply_db_error(&bot, chat_id, e).await,
    };

    let default_days = state.cfg.default_period_days;
    let action = match cmd {
        Command::Start => Action::Start,
        Command::Help => Action::Help,
        Command::Brag(arg) => Action::Picker(parse_days(&arg, default_days)),
        Command::Texto(arg) => Action::Brag(BragFormat::Text, parse_days(&arg, default_days)),
        Command::Pdf(arg) => Action::Brag(BragFormat::Pdf, parse_days(&arg, default_days)),
        Command::Resumo(arg) => Action::Brag(BragFormat::Ai, parse_days(&arg, default_days)),
        Command::Atividades => Action::List,
        Command::Desfazer => Action::Undo,
        Command::Status => Action::Status,
    };

    run_action(&bot, chat_id, &state, &user, action).await
}

/// Mensagens de texto livre: comando disfarçado ou atividade.
pub async fn handle_text(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };

    let (user, route) = match route_text(&state, from, text) {
        Ok(routed) => routed,
        Err(e) => return reply_db_error(&bot, chat_id, e).await,
    };

    match route {
        TextRoute::UnknownCommand => {
            bot.send_message(
                chat_id,
                "\u{2753} Comando não reconhecido. Use /help para ver os comandos.",
            )
            .await?;
            Ok(())
        }
        TextRoute::Action(action) => run_action(&bot, chat_id, &state, &user, action).await,
        TextRoute::Activity => {
            let reply = log_activity(&state, &user, text);
            bot.send_message(chat_id, reply)
                .parse_mode(ParseMode::Html)
                .await?;
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TextRoute {
    UnknownCommand,
    Action(Action),
    Activity,
}

/// Registra o remetente e decide o destino do texto.
fn route_text(
    state: &BotState,
    from: &teloxide::types::User,
    text: &str,
) -> Result<(User, TextRoute), AppError> {
    let user = state.register(from)?;

    if text.starts_with('/') {
        return Ok((user, TextRoute::UnknownCommand));
    }

    let detection = state.nlu.detect(text);
    tracing::debug!(
        user_id = user.telegram_id,
        intent = %detection.intent,
        score = detection.score,
        source = ?detection.source,
        "Intent detected"
    );

    let route = match intent_action(detection.intent, state.cfg.default_period_days) {
        Some(action) => TextRoute::Action(action),
        None => TextRoute::Activity,
    };
    Ok((user, route))
}

/// Botões do seletor de formato.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
        return Ok(());
    };
    let Some((format, days)) = q.data.as_deref().and_then(parse_callback) else {
        tracing::warn!(data = ?q.data, "Unknown callback data");
        return Ok(());
    };

    let user = match state.register(&q.from) {
        Ok(u) => u,
        Err(e) => return reply_db_error(&bot, chat_id, e).await,
    };

    run_action(&bot, chat_id, &state, &user, Action::Brag(format, days)).await
}

fn intent_action(intent: Intent, default_days: u32) -> Option<Action> {
    match intent {
        Intent::GenerateBrag => Some(Action::Picker(default_days)),
        Intent::GeneratePdf => Some(Action::Brag(BragFormat::Pdf, default_days)),
        Intent::GenerateSummary => Some(Action::Brag(BragFormat::Ai, default_days)),
        Intent::ListActivities => Some(Action::List),
        Intent::Help => Some(Action::Help),
        Intent::Greeting => Some(Action::Greeting),
        Intent::None => None,
    }
}

async fn run_action(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user: &User,
    action: Action,
) -> ResponseResult<()> {
    match action {
        Action::Start => send_html(bot, chat_id, &start_text(&user.first_name)).await,
        Action::Help => send_html(bot, chat_id, &help_text()).await,
        Action::Greeting => send_html(bot, chat_id, &greeting_text(&user.first_name)).await,
        Action::Picker(days) => {
            bot.send_message(
                chat_id,
                format!("\u{1f4cb} Como você quer o Brag Document dos últimos {} dias?", days),
            )
            .reply_markup(format_picker(days))
            .await?;
            Ok(())
        }
        Action::Brag(format, days) => send_brag(bot, chat_id, state, user, format, days).await,
        Action::List => send_html(bot, chat_id, &list_text(state, user)).await,
        Action::Undo => send_html(bot, chat_id, &undo_text(state, user)).await,
        Action::Status => send_html(bot, chat_id, &status_text(state, user)).await,
    }
}

async fn send_brag(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user: &User,
    format: BragFormat,
    days: u32,
) -> ResponseResult<()> {
    let doc = match state.build_document(user, days) {
        Ok(doc) => doc,
        Err(e) => return reply_db_error(bot, chat_id, e).await,
    };
    tracing::info!(
        user_id = user.telegram_id,
        format = format.as_str(),
        days,
        activities = doc.total(),
        "Generating brag document"
    );

    match format {
        BragFormat::Text => send_html(bot, chat_id, &doc.render_html()).await,
        BragFormat::Pdf => {
            if doc.is_empty() {
                return send_html(bot, chat_id, &doc.render_html()).await;
            }
            bot.send_chat_action(chat_id, ChatAction::UploadDocument).await?;

            let name = pdf::file_name(&doc);
            let caption = format!("\u{1f4c4} Brag Document \u{2014} {}", doc.period_label());
            let rendered = tokio::task::spawn_blocking(move || pdf::render_pdf(&doc)).await;
            match rendered {
                Ok(Ok(bytes)) => {
                    bot.send_document(chat_id, InputFile::memory(bytes).file_name(name))
                        .caption(caption)
                        .await?;
                    Ok(())
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "PDF rendering failed");
                    send_html(bot, chat_id, "\u{274c} Não consegui gerar o PDF. Tente novamente.")
                        .await
                }
                Err(e) => {
                    tracing::error!(error = %e, "PDF task panicked");
                    send_html(bot, chat_id, "\u{274c} Não consegui gerar o PDF. Tente novamente.")
                        .await
                }
            }
        }
        BragFormat::Ai => {
            let Some(client) = state.llm.as_ref() else {
                return send_html(
                    bot,
                    chat_id,
                    "\u{1f916} O resumo com IA não está configurado neste bot.\n\
                     Use /texto ou /pdf para ver seu Brag Document.",
                )
                .await;
            };
            if doc.is_empty() {
                return send_html(bot, chat_id, &doc.render_html()).await;
            }
            bot.send_chat_action(chat_id, ChatAction::Typing).await?;

            match llm::summarize(client.as_ref(), &doc).await {
                Ok(summary) => {
                    let text = format!(
                        "\u{1f916} Resumo ({})\n\n{}",
                        doc.period_label(),
                        summary
                    );
                    for part in split_message(&text, TELEGRAM_CHUNK) {
                        bot.send_message(chat_id, part).await?;
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(user_id = user.telegram_id, error = %e, "LLM summary failed");
                    send_html(
                        bot,
                        chat_id,
                        "\u{274c} Não consegui gerar o resumo agora. Tente de novo em alguns minutos.",
                    )
                    .await
                }
            }
        }
    }
}

async fn send_html(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    for part in split_message(text, TELEGRAM_CHUNK) {
        bot.send_message(chat_id, part)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}

async fn reply_db_error(bot: &Bot, chat_id: ChatId, e: AppError) -> ResponseResult<()> {
    tracing::error!(chat_id = chat_id.0, error = %e, "Database error");
    bot.send_message(chat_id, "\u{274c} Erro interno. Tente novamente em instantes.")
        .await?;
    Ok(())
}

/// Salva a mensagem como atividade e devolve a confirmação.
fn log_activity(state: &BotState, user: &User, text: &str) -> String {
    let max = state.cfg.max_activity_len;
    if text.chars().count() > max {
        return format!(
            "\u{26a0}\u{fe0f} Atividade muito longa (máximo {} caracteres). Tente resumir.",
            max
        );
    }

    let now = state.now();
    let extracted = timeparse::extract(text, now);
    let date = extracted.date.unwrap_or(now);

    match state.db().create_activity(user.id, &extracted.content, date) {
        Ok(activity) => {
            tracing::info!(
                user_id = user.telegram_id,
                activity_id = activity.id,
                parsed_date = extracted.date.is_some(),
                "Activity logged"
            );
            activity_confirmation(&activity, now)
        }
        Err(AppError::Validation(_)) => {
            "\u{26a0}\u{fe0f} Não entendi a atividade. Escreva o que você fez.".to_string()
        }
        Err(e) => {
            tracing::error!(user_id = user.telegram_id, error = %e, "Failed to save activity");
            "\u{274c} Não consegui salvar a atividade. Tente novamente.".to_string()
        }
    }
}

fn activity_confirmation(activity: &Activity, now: NaiveDateTime) -> String {
    let when = if activity.date.date() == now.date() {
        format!("hoje, {}", activity.date.format("%H:%M"))
    } else {
        activity.date.format("%d/%m/%Y %H:%M").to_string()
    };
    format!(
        "\u{2705} Atividade registrada!\n\n\u{1f4dd} {}\n\u{1f4c5} {}\n\n\
         <i>Use /brag para gerar seu Brag Document ou /desfazer para apagar.</i>",
        html_escape(&activity.content),
        when
    )
}

fn format_picker(days: u32) -> InlineKeyboardMarkup {
    let button = |label: &str, format: BragFormat| {
        InlineKeyboardButton::callback(label.to_string(), callback_data(format, days))
    };
    InlineKeyboardMarkup::new(vec![vec![
        button("\u{1f4dd} Texto", BragFormat::Text),
        button("\u{1f4c4} PDF", BragFormat::Pdf),
        button("\u{1f916} Resumo IA", BragFormat::Ai),
    ]])
}

fn callback_data(format: BragFormat, days: u32) -> String {
    format!("brag:{}:{}", format.as_str(), days)
}

/// `brag:<formato>:<dias>`
fn parse_callback(data: &str) -> Option<(BragFormat, u32)> {
    let mut parts = data.split(':');
    if parts.next()? != "brag" {
        return None;
    }
    let format = BragFormat::from_str_tag(parts.next()?)?;
    let days: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((format, days.clamp(1, MAX_DAYS)))
}

/// Argumento de dias: vazio ou inválido usa o padrão; fora da faixa é limitado.
fn parse_days(arg: &str, default: u32) -> u32 {
    let arg = arg.trim();
    let arg = arg.strip_suffix("dias").or_else(|| arg.strip_suffix('d')).unwrap_or(arg);
    match arg.trim().parse::<u32>() {
        Ok(n) => n.clamp(1, MAX_DAYS),
        Err(_) => default,
    }
}

fn start_text(first_name: &str) -> String {
    format!(
        "\u{1f44b} Olá, {}!\n\n\
         Eu sou o <b>Bragfy</b>. Me conte o que você fez e eu guardo para você.\n\
         Quando precisar, eu monto o seu <b>Brag Document</b>.\n\n\
         \u{1f4cc} <b>Como usar:</b>\n\
         • Mande uma mensagem: <code>Apresentei a demo para o cliente ontem</code>\n\
         • /brag → gerar o Brag Document\n\
         • /pdf → receber em PDF\n\
         • /resumo → resumo com IA\n\
         • /help → todos os comandos",
        html_escape(first_name)
    )
}

fn help_text() -> String {
    "\u{2139}\u{fe0f} <b>Bragfy: ajuda</b>\n\n\
     <b>Registrar</b>\n\
     Mande qualquer mensagem descrevendo o que você fez. Datas são reconhecidas:\n\
     <code>ontem corrigi o bug do checkout</code>\n\
     <code>05/03 às 14h apresentei o roadmap</code>\n\n\
     <b>Brag Document</b>\n\
     /brag [dias] → escolher o formato\n\
     /texto [dias] → texto\n\
     /pdf [dias] → PDF\n\
     /resumo [dias] → resumo com IA\n\n\
     <b>Atividades</b>\n\
     /atividades → últimas atividades\n\
     /desfazer → apagar a última\n\
     /status → estatísticas\n\n\
     \u{1f4a1} Também entendo frases como <i>gerar pdf</i> ou <i>quero ver meu resumo</i>."
        .to_string()
}

fn greeting_text(first_name: &str) -> String {
    format!(
        "\u{1f44b} Oi, {}! O que você fez de bom hoje? Me conte que eu registro.",
        html_escape(first_name)
    )
}

fn list_text(state: &BotState, user: &User) -> String {
    let recent = state.db().recent_activities(user.id, LIST_LIMIT);
    match recent {
        Ok(list) if list.is_empty() => {
            "\u{1f4ed} Nenhuma atividade registrada ainda.\n\
             Mande uma mensagem contando o que você fez!"
                .to_string()
        }
        Ok(list) => {
            let mut text = format!("\u{1f4cb} <b>Últimas {} atividades</b>\n\n", list.len());
            for activity in &list {
                text.push_str(&format!(
                    "• <code>{}</code> {}\n",
                    activity.date.format("%d/%m %H:%M"),
                    html_escape(&activity.content)
                ));
            }
            text
        }
        Err(e) => {
            tracing::error!(user_id = user.telegram_id, error = %e, "Failed to list activities");
            "\u{274c} Não consegui buscar suas atividades.".to_string()
        }
    }
}

fn undo_text(state: &BotState, user: &User) -> String {
    let removed = state.db().delete_last_activity(user.id);
    match removed {
        Ok(Some(activity)) => {
            tracing::info!(
                user_id = user.telegram_id,
                owner_id = activity.user_id,
                activity_id = activity.id,
                "Activity deleted"
            );
            format!(
                "\u{1f5d1}\u{fe0f} Atividade apagada:\n<s>{}</s>",
                html_escape(&activity.content)
            )
        }
        Ok(None) => "\u{2139}\u{fe0f} Não há atividades para apagar.".to_string(),
        Err(e) => {
            tracing::error!(user_id = user.telegram_id, error = %e, "Failed to delete activity");
            "\u{274c} Não consegui apagar a atividade.".to_string()
        }
    }
}

fn status_text(state: &BotState, user: &User) -> String {
    let (total, last) = {
        let db = state.db();
        (
            db.count_activities(user.id),
            db.recent_activities(user.id, 1),
        )
    };
    match (total, last) {
        (Ok(total), Ok(last)) => {
            let last = last
                .first()
                .map(|a| a.date.format("%d/%m/%Y %H:%M").to_string())
                .unwrap_or_else(|| "nenhuma".to_string());
            let account = match user.handle() {
                Some(handle) => format!("{} ({})", user.display_name(), handle),
                None => user.display_name(),
            };
            format!(
                "\u{1f4ca} <b>Seu Bragfy</b>\n\n\
                 • Conta: {}\n\
                 • Atividades registradas: {}\n\
                 • Última atividade: {}\n\
                 • Período padrão: {} dias\n\
                 • Resumo com IA: {}",
                html_escape(&account),
                total,
                last,
                state.cfg.default_period_days,
                if state.llm.is_some() { "ativo" } else { "desativado" }
            )
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(user_id = user.telegram_id, error = %e, "Failed to load status");
            "\u{274c} Não consegui carregar suas estatísticas.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NluConfig;
    use chrono::{Duration, NaiveDate};

    fn state() -> BotState {
        BotState {
            db: Arc::new(Mutex::new(Database::init(":memory:").unwrap())),
            nlu: IntentClassifier::new(&NluConfig::default()),
            llm: None,
            cfg: BotConfig::default(),
        }
    }

    fn tg_user(id: u64, first_name: &str) -> teloxide::types::User {
        teloxide::types::User {
            id: UserId(id),
            is_bot: false,
            first_name: first_name.to_string(),
            last_name: None,
            username: None,
            language_code: Some("pt-br".into()),
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn test_commands_parse() {
        let descriptions = Command::descriptions().to_string();
        assert!(descriptions.contains("resumo com IA"));
        assert!(descriptions.contains("/desfazer"));

        assert_eq!(
            Command::parse("/pdf 30", "bragfy_bot").unwrap(),
            Command::Pdf("30".into())
        );
        assert_eq!(Command::parse("/status", "bragfy_bot").unwrap(), Command::Status);
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days("", 7), 7);
        assert_eq!(parse_days(" 30 ", 7), 30);
        assert_eq!(parse_days("15 dias", 7), 15);
        assert_eq!(parse_days("10d", 7), 10);
        assert_eq!(parse_days("0", 7), 1);
        assert_eq!(parse_days("9999", 7), 365);
        assert_eq!(parse_days("semana", 7), 7);
    }

    #[test]
    fn test_callback_round_trip() {
        let data = callback_data(BragFormat::Pdf, 30);
        assert_eq!(data, "brag:pdf:30");
        assert_eq!(parse_callback(&data), Some((BragFormat::Pdf, 30)));
        assert_eq!(parse_callback("brag:ai:0"), Some((BragFormat::Ai, 1)));
        assert_eq!(parse_callback("brag:doc:7"), None);
        assert_eq!(parse_callback("other:text:7"), None);
        assert_eq!(parse_callback("brag:text:7:extra"), None);
    }

    #[test]
    fn test_intent_actions() {
        assert_eq!(intent_action(Intent::GenerateBrag, 7), Some(Action::Picker(7)));
        assert_eq!(
            intent_action(Intent::GeneratePdf, 7),
            Some(Action::Brag(BragFormat::Pdf, 7))
        );
        assert_eq!(
            intent_action(Intent::GenerateSummary, 14),
            Some(Action::Brag(BragFormat::Ai, 14))
        );
        assert_eq!(intent_action(Intent::None, 7), None);
    }

    #[test]
    fn test_log_activity_extracts_date() {
        let state = state();
        let user = state.register(&tg_user(10, "Ana")).unwrap();

        let reply = log_activity(&state, &user, "ontem apresentei a demo <v2>");
        assert!(reply.contains("Atividade registrada"));
        assert!(reply.contains("apresentei a demo &lt;v2&gt;"));

        let list = state.db().recent_activities(user.id, 10).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].content, "apresentei a demo <v2>");
        assert_eq!(list[0].date.date(), state.now().date() - Duration::days(1));
    }

    #[test]
    fn test_log_activity_too_long() {
        let state = state();
        let user = state.register(&tg_user(10, "Ana")).unwrap();
        let reply = log_activity(&state, &user, &"a".repeat(501));
        assert!(reply.contains("muito longa"));
        assert_eq!(state.db().count_activities(user.id).unwrap(), 0);
    }

    #[test]
    fn test_build_document_period() {
        let state = state();
        let user = state.register(&tg_user(10, "Ana")).unwrap();
        let now = state.now();
        {
            let db = state.db();
            db.create_activity(user.id, "recente", now - Duration::days(2)).unwrap();
            db.create_activity(user.id, "antiga", now - Duration::days(40)).unwrap();
        }

        let doc = state.build_document(&user, 7).unwrap();
        assert_eq!(doc.total(), 1);
        assert_eq!(doc.period_end, now.date());
        assert_eq!(doc.period_start, now.date() - Duration::days(6));

        let doc = state.build_document(&user, 60).unwrap();
        assert_eq!(doc.total(), 2);
    }

    #[test]
    fn test_undo_and_list() {
        let state = state();
        let user = state.register(&tg_user(10, "Ana")).unwrap();
        assert!(list_text(&state, &user).contains("Nenhuma atividade"));
        assert!(undo_text(&state, &user).contains("Não há atividades"));

        log_activity(&state, &user, "corrigi o bug & fiz deploy");
        assert!(list_text(&state, &user).contains("corrigi o bug &amp; fiz deploy"));
        assert!(status_text(&state, &user).contains("Atividades registradas: 1"));
        assert!(undo_text(&state, &user).contains("Atividade apagada"));
        assert_eq!(state.db().count_activities(user.id).unwrap(), 0);
    }

    #[test]
    fn test_unknown_slash_command_still_registers() {
        let state = state();
        let (user, route) =
            route_text(&state, &tg_user(42, "Bia"), "/comando_inexistente").unwrap();
        assert_eq!(route, TextRoute::UnknownCommand);
        assert_eq!(user.telegram_id, 42);
        assert!(state.db().find_user(42).unwrap().is_some());
    }

    #[test]
    fn test_route_text() {
        let state = state();
        let from = tg_user(7, "Caio");
        let (_, route) = route_text(&state, &from, "gerar pdf").unwrap();
        assert_eq!(route, TextRoute::Action(Action::Brag(BragFormat::Pdf, 7)));
        let (_, route) = route_text(&state, &from, "corrigi o bug do login").unwrap();
        assert_eq!(route, TextRoute::Activity);
    }

    #[test]
    fn test_status_shows_username() {
        let state = state();
        let mut from = tg_user(10, "Ana");
        from.username = Some("ana_dev".into());
        let user = state.register(&from).unwrap();
        assert!(status_text(&state, &user).contains("Conta: Ana (@ana_dev)"));
    }

    #[test]
    fn test_activity_confirmation_today() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap();
        let activity = Activity {
            id: 1,
            user_id: 1,
            content: "daily".into(),
            date: now,
        };
        assert!(activity_confirmation(&activity, now).contains("hoje, 15:00"));

        let older = Activity {
            date: now - Duration::days(3),
            ..activity
        };
        assert!(activity_confirmation(&older, now).contains("07/03/2026 15:00"));
    }

    #[test]
    fn test_local_now_offset() {
        let utc = Utc::now().naive_utc();
        let brt = local_now(-3);
        let diff = (utc - brt).num_minutes();
        assert!((179..=181).contains(&diff));
    }
}
