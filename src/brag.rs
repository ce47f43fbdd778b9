use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::db::{Activity, Database, User};
use crate::error::AppError;

/// Limite de texto de uma mensagem do Telegram (4096) com folga.
pub const TELEGRAM_CHUNK: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BragItem {
    pub time: NaiveTime,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BragDay {
    pub date: NaiveDate,
    pub items: Vec<BragItem>,
}

/// Activities of one user over a period, grouped by day.
#[derive(Debug, Clone)]
pub struct BragDocument {
    pub user_name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub generated_at: NaiveDateTime,
    pub days: Vec<BragDay>,
}

impl BragDocument {
    /// Agrupa as atividades por dia, em ordem cronológica.
    pub fn build(
        user_name: &str,
        activities: &[Activity],
        period_start: NaiveDate,
        period_end: NaiveDate,
        generated_at: NaiveDateTime,
    ) -> Self {
        let mut sorted: Vec<&Activity> = activities
            .iter()
            .filter(|a| {
                let d = a.date.date();
                d >= period_start && d <= period_end
            })
            .collect();
        sorted.sort_by_key(|a| (a.date, a.id));

        let mut days: Vec<BragDay> = Vec::new();
        for activity in sorted {
            let item = BragItem {
                time: activity.date.time(),
                content: activity.content.clone(),
            };
            match days.last_mut() {
                Some(day) if day.date == activity.date.date() => day.items.push(item),
                _ => days.push(BragDay {
                    date: activity.date.date(),
                    items: vec![item],
                }),
            }
        }

        Self {
            user_name: user_name.to_string(),
            period_start,
            period_end,
            generated_at,
            days,
        }
    }

    pub fn total(&self) -> usize {
        self.days.iter().map(|d| d.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn period_label(&self) -> String {
        format!(
            "{} a {}",
            self.period_start.format("%d/%m/%Y"),
            self.period_end.format("%d/%m/%Y")
        )
    }

    pub fn empty_message(&self) -> String {
        format!(
            "Nenhuma atividade registrada entre {}.",
            self.period_label()
        )
    }

    /// Plain text, usado no PDF, no prompt da IA e na CLI.
    pub fn render_text(&self) -> String {
        let mut text = format!(
            "BRAG DOCUMENT - {}\nPeríodo: {}\n",
            self.user_name,
            self.period_label()
        );

        if self.is_empty() {
            text.push('\n');
            text.push_str(&self.empty_message());
            text.push('\n');
            return text;
        }

        for day in &self.days {
            text.push_str(&format!("\n{}\n", day_heading(day.date)));
            for item in &day.items {
                text.push_str(&format!("  - {} {}\n", item.time.format("%H:%M"), item.content));
            }
        }
        text.push_str(&format!("\nTotal: {}\n", activity_count(self.total())));
        text
    }

    /// Telegram HTML.
    pub fn render_html(&self) -> String {
        let mut text = format!(
            "\u{1f4cb} <b>Brag Document</b> — {}\n\u{1f4c5} {}\n",
            html_escape(&self.user_name),
            self.period_label()
        );

        if self.is_empty() {
            text.push('\n');
            text.push_str(&html_escape(&self.empty_message()));
            text.push_str("\n\nMande uma mensagem descrevendo o que você fez para registrar!");
            return text;
        }

        for day in &self.days {
            text.push_str(&format!("\n<b>{}</b>\n", day_heading(day.date)));
            for item in &day.items {
                text.push_str(&format!(
                    "• <code>{}</code> {}\n",
                    item.time.format("%H:%M"),
                    html_escape(&item.content)
                ));
            }
        }
        text.push_str(&format!(
            "\n\u{2705} <b>Total:</b> {}",
            activity_count(self.total())
        ));
        text
    }
}

/// Brag Document dos últimos `days` dias (incluindo hoje) de um usuário.
pub fn collect(
    db: &Database,
    user: &User,
    days: u32,
    now: NaiveDateTime,
) -> Result<BragDocument, AppError> {
    let today = now.date();
    let start = today - Duration::days(i64::from(days.max(1)) - 1);
    let activities = db.activities_since(user.id, start.and_time(NaiveTime::MIN))?;
    Ok(BragDocument::build(
        &user.display_name(),
        &activities,
        start,
        today,
        now,
    ))
}

pub fn weekday_pt(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "segunda-feira",
        Weekday::Tue => "terça-feira",
        Weekday::Wed => "quarta-feira",
        Weekday::Thu => "quinta-feira",
        Weekday::Fri => "sexta-feira",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

pub fn day_heading(date: NaiveDate) -> String {
    format!("{}, {}", weekday_pt(date.weekday()), date.format("%d/%m/%Y"))
}

fn activity_count(n: usize) -> String {
    if n == 1 {
        "1 atividade".to_string()
    } else {
        format!("{} atividades", n)
    }
}

/// Escapa os caracteres especiais do HTML do Telegram.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Quebra um texto longo em partes de até `max` bytes, preferindo quebras de linha.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    if text.len() <= max {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if current.len() + line.len() > max && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        if line.len() > max {
            // linha sozinha maior que o limite: corta em fronteira de char
            let mut rest = line;
            while rest.len() > max {
                let mut cut = max;
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                parts.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            current.push_str(rest);
        } else {
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
