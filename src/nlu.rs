//! Intent detection for free-text messages.
//!
//! Every message a user sends is either a command in disguise ("gerar pdf",
//! "quero ver meu resumo") or an activity to be logged. Logging a command
//! as an activity is annoying; treating an activity as a command loses data.
//! The pipeline is tuned so that, when in doubt, the message is an activity:
//!
//! 1. denylist: work verbs ("implementei", "corrigi", ...) mean activity
//! 2. whitelist: known command phrases win with score 1.0
//! 3. long messages are activities
//! 4. Naive Bayes classifier, accepted only above the confidence threshold
//!    and when an intent keyword is present

use std::collections::{HashMap, HashSet};
use std::fmt;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::NluConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    GenerateBrag,
    GeneratePdf,
    GenerateSummary,
    ListActivities,
    Help,
    Greeting,
    /// Not a command: log it.
    None,
}

impl Intent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GenerateBrag => "brag.generate",
            Self::GeneratePdf => "brag.pdf",
            Self::GenerateSummary => "brag.summary",
            Self::ListActivities => "activities.list",
            Self::Help => "help",
            Self::Greeting => "greeting",
            Self::None => "none",
        }
    }

    pub fn is_command(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Tokens one of which must be present for the classifier to pick this intent.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::GenerateBrag => &["brag", "bragfy", "documento", "relatorio", "conquistas"],
            Self::GeneratePdf => &["pdf"],
            Self::GenerateSummary => &["resumo", "resumir", "resume", "ia", "inteligencia"],
            Self::ListActivities => &["atividades", "registros", "historico", "listar", "lista"],
            Self::Help => &["ajuda", "help", "comandos", "funciona", "usar", "ajudar"],
            Self::Greeting => &["oi", "ola", "bom", "boa", "opa", "hey", "ai"],
            Self::None => &[],
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Whitelist,
    Denylist,
    LengthGate,
    Classifier,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub intent: Intent,
    pub score: f64,
    pub source: DetectionSource,
}

/// Frases de treino. Os textos passam pela mesma normalização das mensagens.
pub const TRAINING_CORPUS: &[(Intent, &str)] = &[
    (Intent::GenerateBrag, "gerar brag"),
    (Intent::GenerateBrag, "gerar meu brag"),
    (Intent::GenerateBrag, "gera o brag document"),
    (Intent::GenerateBrag, "quero meu brag document"),
    (Intent::GenerateBrag, "gerar documento"),
    (Intent::GenerateBrag, "gerar relatório"),
    (Intent::GenerateBrag, "quero ver meu relatório"),
    (Intent::GenerateBrag, "me mostra meu brag"),
    (Intent::GenerateBrag, "mostrar brag"),
    (Intent::GenerateBrag, "gerar brag em texto"),
    (Intent::GenerateBrag, "ver minhas conquistas"),
    (Intent::GenerateBrag, "quero o documento das minhas conquistas"),
    (Intent::GenerateBrag, "gera o relatório da semana"),
    (Intent::GenerateBrag, "brag"),
    (Intent::GenerateBrag, "bragfy"),
    (Intent::GeneratePdf, "gerar pdf"),
    (Intent::GeneratePdf, "gera pdf"),
    (Intent::GeneratePdf, "quero o pdf"),
    (Intent::GeneratePdf, "me manda o pdf"),
    (Intent::GeneratePdf, "exportar pdf"),
    (Intent::GeneratePdf, "exportar em pdf"),
    (Intent::GeneratePdf, "baixar pdf"),
    (Intent::GeneratePdf, "gerar brag em pdf"),
    (Intent::GeneratePdf, "quero meu relatório em pdf"),
    (Intent::GeneratePdf, "manda o pdf do brag"),
    (Intent::GeneratePdf, "pdf por favor"),
    (Intent::GeneratePdf, "gerar documento pdf"),
    (Intent::GeneratePdf, "pdf"),
    (Intent::GenerateSummary, "quero ver meu resumo"),
    (Intent::GenerateSummary, "gerar resumo"),
    (Intent::GenerateSummary, "resumo com ia"),
    (Intent::GenerateSummary, "resumir minhas atividades"),
    (Intent::GenerateSummary, "me faz um resumo"),
    (Intent::GenerateSummary, "resumo da semana"),
    (Intent::GenerateSummary, "fazer resumo com inteligência artificial"),
    (Intent::GenerateSummary, "quero um resumo"),
    (Intent::GenerateSummary, "resume minhas conquistas"),
    (Intent::GenerateSummary, "resumo inteligente"),
    (Intent::GenerateSummary, "gera um resumo com ia"),
    (Intent::ListActivities, "listar atividades"),
    (Intent::ListActivities, "minhas atividades"),
    (Intent::ListActivities, "ver atividades"),
    (Intent::ListActivities, "mostrar minhas atividades"),
    (Intent::ListActivities, "lista de atividades"),
    (Intent::ListActivities, "quais atividades registrei"),
    (Intent::ListActivities, "ver registros"),
    (Intent::ListActivities, "meus registros"),
    (Intent::ListActivities, "histórico"),
    (Intent::ListActivities, "últimas atividades"),
    (Intent::Help, "ajuda"),
    (Intent::Help, "help"),
    (Intent::Help, "como funciona"),
    (Intent::Help, "como usar"),
    (Intent::Help, "quais comandos"),
    (Intent::Help, "o que você faz"),
    (Intent::Help, "me ajuda"),
    (Intent::Help, "preciso de ajuda"),
    (Intent::Help, "comandos"),
    (Intent::Greeting, "oi"),
    (Intent::Greeting, "olá"),
    (Intent::Greeting, "bom dia"),
    (Intent::Greeting, "boa tarde"),
    (Intent::Greeting, "boa noite"),
    (Intent::Greeting, "e aí"),
    (Intent::Greeting, "opa"),
    (Intent::Greeting, "oi bragfy"),
    (Intent::Greeting, "olá tudo bem"),
    (Intent::Greeting, "hey"),
    (Intent::None, "fiz deploy da api de pagamentos"),
    (Intent::None, "corrigi um bug no checkout"),
    (Intent::None, "participei da reunião de planejamento"),
    (Intent::None, "apresentei a demo para o cliente"),
    (Intent::None, "revisei três pull requests"),
    (Intent::None, "escrevi a documentação do serviço"),
    (Intent::None, "mentorei um estagiário"),
    (Intent::None, "organizei o workshop de testes"),
    (Intent::None, "melhorei a performance da consulta"),
    (Intent::None, "terminei a migração do banco"),
    (Intent::None, "ajudei o time de dados com o pipeline"),
    (Intent::None, "implementei cache no endpoint de busca"),
    (Intent::None, "entreguei a feature de notificações"),
    (Intent::None, "dei uma palestra sobre rust"),
    (Intent::None, "resolvi incidente em produção"),
];

struct Phrase {
    text: &'static str,
    intent: Intent,
    /// A mensagem inteira precisa ser a frase.
    whole: bool,
}

const fn contains(text: &'static str, intent: Intent) -> Phrase {
    Phrase { text, intent, whole: false }
}

const fn exact(text: &'static str, intent: Intent) -> Phrase {
    Phrase { text, intent, whole: true }
}

/// Priority order: the first match wins ("gerar brag em pdf" is a PDF).
const WHITELIST: &[Phrase] = &[
    contains("gerar pdf", Intent::GeneratePdf),
    contains("gera pdf", Intent::GeneratePdf),
    contains("gerar o pdf", Intent::GeneratePdf),
    contains("brag em pdf", Intent::GeneratePdf),
    contains("relatorio em pdf", Intent::GeneratePdf),
    contains("exportar pdf", Intent::GeneratePdf),
    contains("baixar pdf", Intent::GeneratePdf),
    contains("quero o pdf", Intent::GeneratePdf),
    contains("manda o pdf", Intent::GeneratePdf),
    exact("pdf", Intent::GeneratePdf),
    contains("resumo com ia", Intent::GenerateSummary),
    contains("resumir com ia", Intent::GenerateSummary),
    contains("gerar resumo", Intent::GenerateSummary),
    contains("meu resumo", Intent::GenerateSummary),
    contains("resumo inteligente", Intent::GenerateSummary),
    contains("resumo da semana", Intent::GenerateSummary),
    contains("resumir", Intent::GenerateSummary),
    contains("manda o resumo", Intent::GenerateSummary),
    contains("ver o resumo", Intent::GenerateSummary),
    contains("quero o resumo", Intent::GenerateSummary),
    exact("resumo", Intent::GenerateSummary),
    contains("gerar brag", Intent::GenerateBrag),
    contains("meu brag", Intent::GenerateBrag),
    contains("brag document", Intent::GenerateBrag),
    contains("gerar relatorio", Intent::GenerateBrag),
    contains("gerar documento", Intent::GenerateBrag),
    exact("brag", Intent::GenerateBrag),
    exact("bragfy", Intent::GenerateBrag),
    exact("relatorio", Intent::GenerateBrag),
    contains("minhas atividades", Intent::ListActivities),
    contains("listar atividades", Intent::ListActivities),
    contains("ver atividades", Intent::ListActivities),
    contains("meus registros", Intent::ListActivities),
    exact("atividades", Intent::ListActivities),
    exact("historico", Intent::ListActivities),
    exact("registros", Intent::ListActivities),
    contains("como funciona", Intent::Help),
    contains("quais comandos", Intent::Help),
    exact("ajuda", Intent::Help),
    exact("help", Intent::Help),
    exact("oi", Intent::Greeting),
    exact("ola", Intent::Greeting),
    exact("opa", Intent::Greeting),
    exact("hey", Intent::Greeting),
    exact("e ai", Intent::Greeting),
    exact("bom dia", Intent::Greeting),
    exact("boa tarde", Intent::Greeting),
    exact("boa noite", Intent::Greeting),
];

/// Work verbs and nouns that only show up in activity notes.
const DENYLIST: &[&str] = &[
    "fiz", "dei", "fui", "tive", "reuniao", "implementei", "corrigi", "participei", "apresentei",
    "terminei", "entreguei", "ajudei", "criei", "desenvolvi", "escrevi", "revisei", "organizei",
    "mentorei", "liderei", "lancei", "resolvi", "conclui", "finalizei", "estudei", "publiquei",
    "deploy", "refatorei", "configurei", "migrei", "automatizei", "documentei", "testei",
];

/// Lowercase, strip accents and punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unigrams plus bigrams joined by `_`.
fn features(normalized: &str) -> Vec<String> {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let mut out: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    for pair in words.windows(2) {
        out.push(format!("{}_{}", pair[0], pair[1]));
    }
    out
}

struct ClassStats {
    intent: Intent,
    docs: usize,
    token_counts: HashMap<String, u32>,
    total_tokens: u32,
}

/// Multinomial Naive Bayes with Laplace smoothing.
pub struct NaiveBayes {
    classes: Vec<ClassStats>,
    vocab: HashSet<String>,
    total_docs: usize,
}

impl NaiveBayes {
    pub fn train(corpus: &[(Intent, &str)]) -> Self {
        let mut classes: Vec<ClassStats> = Vec::new();
        let mut vocab = HashSet::new();

        for (intent, text) in corpus {
            let idx = match classes.iter().position(|c| c.intent == *intent) {
                Some(i) => i,
                None => {
                    classes.push(ClassStats {
                        intent: *intent,
                        docs: 0,
                        token_counts: HashMap::new(),
                        total_tokens: 0,
                    });
                    classes.len() - 1
                }
            };
            let stats = &mut classes[idx];
            stats.docs += 1;
            for token in features(&normalize(text)) {
                vocab.insert(token.clone());
                *stats.token_counts.entry(token).or_insert(0) += 1;
                stats.total_tokens += 1;
            }
        }

        Self {
            classes,
            vocab,
            total_docs: corpus.len(),
        }
    }

    /// Posterior per intent, best first. Empty when no token is known.
    pub fn predict(&self, normalized: &str) -> Vec<(Intent, f64)> {
        let tokens: Vec<String> = features(normalized)
            .into_iter()
            .filter(|t| self.vocab.contains(t))
            .collect();
        if tokens.is_empty() || self.classes.is_empty() {
            return Vec::new();
        }

        let vocab_size = self.vocab.len() as f64;
        let log_scores: Vec<(Intent, f64)> = self
            .classes
            .iter()
            .map(|c| {
                let prior = (c.docs as f64 / self.total_docs as f64).ln();
                let denom = c.total_tokens as f64 + vocab_size;
                let likelihood: f64 = tokens
                    .iter()
                    .map(|t| {
                        let count = c.token_counts.get(t).copied().unwrap_or(0) as f64;
                        ((count + 1.0) / denom).ln()
                    })
                    .sum();
                (c.intent, prior + likelihood)
            })
            .collect();

        // softmax
        let max = log_scores
            .iter()
            .map(|(_, s)| *s)
            .fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = log_scores.iter().map(|(_, s)| (s - max).exp()).sum();
        let mut posterior: Vec<(Intent, f64)> = log_scores
            .into_iter()
            .map(|(i, s)| (i, (s - max).exp() / sum))
            .collect();
        posterior.sort_by(|a, b| b.1.total_cmp(&a.1));
        posterior
    }
}

pub struct IntentClassifier {
    model: NaiveBayes,
    threshold: f64,
    max_command_words: usize,
}

impl IntentClassifier {
    pub fn new(cfg: &NluConfig) -> Self {
        Self::train(TRAINING_CORPUS, cfg)
    }

    pub fn train(corpus: &[(Intent, &str)], cfg: &NluConfig) -> Self {
        Self {
            model: NaiveBayes::train(corpus),
            threshold: cfg.confidence_threshold,
            max_command_words: cfg.max_command_words,
        }
    }

    pub fn detect(&self, text: &str) -> Detection {
        let normalized = normalize(text);
        let words: Vec<&str> = normalized.split_whitespace().collect();

        if words.is_empty() || words.iter().any(|w| is_work_word(w)) {
            return none(1.0, DetectionSource::Denylist);
        }

        let padded = format!(" {} ", normalized);
        for phrase in WHITELIST {
            let hit = if phrase.whole {
                normalized == phrase.text
            } else {
                padded.contains(&format!(" {} ", phrase.text))
            };
            if hit {
                return Detection {
                    intent: phrase.intent,
                    score: 1.0,
                    source: DetectionSource::Whitelist,
                };
            }
        }

        if words.len() > self.max_command_words {
            return none(1.0, DetectionSource::LengthGate);
        }

        let Some(&(intent, score)) = self.model.predict(&normalized).first() else {
            return none(0.0, DetectionSource::Classifier);
        };

        let has_keyword = intent
            .keywords()
            .iter()
            .any(|k| words.contains(k));
        if intent.is_command() && score >= self.threshold && has_keyword {
            tracing::debug!(intent = %intent, score, "classifier accepted intent");
            Detection {
                intent,
                score,
                source: DetectionSource::Classifier,
            }
        } else {
            tracing::debug!(intent = %intent, score, "classifier result rejected");
            none(score, DetectionSource::Classifier)
        }
    }
}

fn none(score: f64, source: DetectionSource) -> Detection {
    Detection {
        intent: Intent::None,
        score,
        source,
    }
}

/// Past tense verbs that still belong to commands ("quais atividades registrei").
const COMMAND_VERBS: &[&str] = &["registrei", "anotei", "salvei"];

/// Denylist hit, or a first-person past tense verb ("-ei": "otimizei").
fn is_work_word(word: &str) -> bool {
    if COMMAND_VERBS.contains(&word) {
        return false;
    }
    DENYLIST.contains(&word) || (word.len() >= 6 && word.ends_with("ei"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(&NluConfig::default())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Gerar   PDF!! "), "gerar pdf");
        assert_eq!(normalize("Relatório da SEMANA?"), "relatorio da semana");
        assert_eq!(normalize("e aí, tudo bem?"), "e ai tudo bem");
    }

    #[test]
    fn test_whitelist_phrases() {
        let c = classifier();
        assert_eq!(c.detect("gerar pdf").intent, Intent::GeneratePdf);
        assert_eq!(c.detect("Quero ver meu resumo").intent, Intent::GenerateSummary);
        assert_eq!(c.detect("gerar brag em PDF").intent, Intent::GeneratePdf);
        assert_eq!(c.detect("gerar brag").intent, Intent::GenerateBrag);
        assert_eq!(c.detect("minhas atividades").intent, Intent::ListActivities);
        assert_eq!(c.detect("Como funciona?").intent, Intent::Help);
        assert_eq!(c.detect("Oi!").intent, Intent::Greeting);

        let d = c.detect("gerar pdf");
        assert_eq!(d.source, DetectionSource::Whitelist);
        assert!((d.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_word_commands() {
        let c = classifier();
        assert_eq!(c.detect("Resumo").intent, Intent::GenerateSummary);
        assert_eq!(c.detect("atividades").intent, Intent::ListActivities);
        assert_eq!(c.detect("Histórico").intent, Intent::ListActivities);
        assert_eq!(c.detect("relatório").intent, Intent::GenerateBrag);
        assert_eq!(c.detect("me manda o resumo").intent, Intent::GenerateSummary);

        // a palavra sozinha é comando; dentro de uma nota, não
        let d = c.detect("li o resumo do livro de arquitetura limpa com o time");
        assert_eq!(d.intent, Intent::None);
    }

    #[test]
    fn test_greeting_must_be_whole_message() {
        let c = classifier();
        let d = c.detect("bom dia de trabalho com o time de design e produto");
        assert_eq!(d.intent, Intent::None);
    }

    #[test]
    fn test_work_verbs_are_activities() {
        let c = classifier();
        let d = c.detect("Implementei o botão de gerar PDF");
        assert_eq!(d.intent, Intent::None);
        assert_eq!(d.source, DetectionSource::Denylist);

        // verbo no passado fora da lista
        assert_eq!(c.detect("otimizei o relatório").intent, Intent::None);
        assert_eq!(c.detect("fiz o resumo da sprint").intent, Intent::None);
        assert_ne!(c.detect("quais atividades registrei").source, DetectionSource::Denylist);
    }

    #[test]
    fn test_long_messages_are_activities() {
        let c = classifier();
        let d = c.detect("hoje o dia foi longo com muitas conversas sobre o relatório trimestral");
        assert_eq!(d.intent, Intent::None);
        assert_eq!(d.source, DetectionSource::LengthGate);
    }

    #[test]
    fn test_classifier_paraphrases() {
        let c = classifier();
        let d = c.detect("me manda meu pdf");
        assert_eq!(d.intent, Intent::GeneratePdf);
        assert_eq!(d.source, DetectionSource::Classifier);
        assert!(d.score >= 0.75);

        assert_eq!(c.detect("me mostra o relatório").intent, Intent::GenerateBrag);
        assert_eq!(
            c.detect("quero um resumo das conquistas").intent,
            Intent::GenerateSummary
        );
        assert_eq!(c.detect("ver lista de registros").intent, Intent::ListActivities);
        assert_eq!(c.detect("preciso de ajuda com os comandos").intent, Intent::Help);
    }

    #[test]
    fn test_unknown_text_is_activity() {
        let c = classifier();
        assert_eq!(c.detect("Kickoff do projeto X").intent, Intent::None);
        assert_eq!(c.detect("").intent, Intent::None);
        assert_eq!(c.detect("!!!").intent, Intent::None);
    }

    #[test]
    fn test_low_confidence_is_rejected() {
        let strict = NluConfig {
            confidence_threshold: 1.0,
            ..NluConfig::default()
        };
        let c = IntentClassifier::new(&strict);
        assert_eq!(c.detect("me manda meu pdf").intent, Intent::None);
        // regras não dependem do limiar
        assert_eq!(c.detect("gerar pdf").intent, Intent::GeneratePdf);
    }

    #[test]
    fn test_naive_bayes_prefers_seen_tokens() {
        let model = NaiveBayes::train(&[
            (Intent::Help, "ajuda"),
            (Intent::Help, "me ajuda"),
            (Intent::GeneratePdf, "pdf"),
            (Intent::GeneratePdf, "quero pdf"),
        ]);
        let scores = model.predict("quero pdf");
        assert_eq!(scores[0].0, Intent::GeneratePdf);
        let total: f64 = scores.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(model.predict("xyz").is_empty());
    }
}
