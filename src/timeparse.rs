use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};

/// Texto da atividade já sem os trechos de data/hora reconhecidos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub content: String,
    pub date: Option<NaiveDateTime>,
}

// 2026-03-01
static RE_ISO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:no\s+dia|dia|em)\s+)?\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex")
});
// 01-03-2026
static RE_DMY_DASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:no\s+dia|dia|em)\s+)?\b(\d{1,2})-(\d{1,2})-(\d{4})\b").expect("valid regex")
});
// 01/03, dia 1/3, 01/03/26, 01/03/2026
static RE_DMY_SLASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(no\s+dia|dia|em)\s+)?\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b")
        .expect("valid regex")
});
static RE_DAYS_AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:h[aá]\s+(\d{1,3})\s+dias?|(\d{1,3})\s+dias?\s+atr[aá]s)\b").expect("valid regex")
});
static RE_RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(anteontem|ontem|hoje|semana\s+passada)\b").expect("valid regex")
});

// 14:30, 14h30, às 9h05
static RE_HOUR_MIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:às|as)\s+)?\b([01]?\d|2[0-3])\s*(?::|h)\s*([0-5]\d)\b").expect("valid regex")
});
// das 9h às 11h, de 14:00 às 15:00
static RE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:das|de)\s+([01]?\d|2[0-3])(?:\s*(?::|h)\s*([0-5]\d)|\s*(?:hs|horas|h))?\s+(?:às|as|até)\s+(?:[01]?\d|2[0-3])(?:\s*(?::|h)\s*[0-5]\d|\s*(?:hs|horas|h))?\b",
    )
    .expect("valid regex")
});
// às 14h, as 9 horas ("5h" solto é duração)
static RE_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:às|as|das)\s+([01]?\d|2[0-3])\s*(?:hs|horas|h)\b").expect("valid regex")
});
// às 14 (somente com crase: "as 3" é artigo)
static RE_AS_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bàs\s+([01]?\d|2[0-3])\b").expect("valid regex")
});

/// Words that turn "2h" into a duration instead of a time of day.
const DURATION_MARKERS: &[&str] = &[
    "de", "por", "durante", "levou", "levei", "mais de", "quase", "trabalhei", "passei", "gastei",
    "fiquei", "dediquei", "investi", "durou",
];

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

/// Extrai data/hora de um texto livre em português.
///
/// `now` é o horário local do usuário; datas relativas ("ontem", "há 3 dias")
/// são resolvidas a partir dele. Sem horário explícito, dias passados ficam
/// ao meio-dia e "hoje" fica em `now`.
pub fn extract(text: &str, now: NaiveDateTime) -> Extracted {
    let today = now.date();
    let date = find_date(text, today);
    let time = find_time(text, date.as_ref().map(|(_, r)| r));

    let resolved = match (&date, &time) {
        (None, None) => None,
        (Some((d, _)), Some((t, _))) => Some(d.and_time(*t)),
        (Some((d, _)), None) if *d == today => Some(now),
        (Some((d, _)), None) => Some(d.and_time(noon())),
        (None, Some((t, _))) => Some(today.and_time(*t)),
    };

    let mut spans: Vec<Range<usize>> = Vec::new();
    if let Some((_, r)) = date {
        spans.push(r);
    }
    if let Some((_, r)) = time {
        spans.push(r);
    }

    let content = if spans.is_empty() {
        text.trim().to_string()
    } else {
        let cleaned = remove_spans(text, &mut spans);
        if cleaned.is_empty() {
            text.trim().to_string()
        } else {
            cleaned
        }
    };

    Extracted {
        content,
        date: resolved,
    }
}

fn find_date(text: &str, today: NaiveDate) -> Option<(NaiveDate, Range<usize>)> {
    for caps in RE_ISO.captures_iter(text) {
        if let Some(d) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Some((d, full_range(&caps)));
        }
    }
    for caps in RE_DMY_DASH.captures_iter(text) {
        if let Some(d) = ymd(&caps[3], &caps[2], &caps[1]) {
            return Some((d, full_range(&caps)));
        }
    }
    for caps in RE_DMY_SLASH.captures_iter(text) {
        let parsed = match caps.get(4) {
            Some(y) => {
                let year = if y.as_str().len() == 2 {
                    format!("20{}", y.as_str())
                } else {
                    y.as_str().to_string()
                };
                ymd(&year, &caps[3], &caps[2])
            }
            // "1/2" solto é fração; só vale com "dia"/"em" ou zero à esquerda
            None if caps.get(1).is_none() && (caps[2].len() < 2 || caps[3].len() < 2) => None,
            None => day_month_in_past(today, &caps[2], &caps[3]),
        };
        if let Some(d) = parsed {
            return Some((d, full_range(&caps)));
        }
    }
    if let Some(caps) = RE_DAYS_AGO.captures(text) {
        let n: i64 = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok())?;
        return Some((today - Duration::days(n), full_range(&caps)));
    }
    if let Some(caps) = RE_RELATIVE.captures(text) {
        let word = caps[1].to_lowercase();
        let back = match word.split_whitespace().next() {
            Some("anteontem") => 2,
            Some("ontem") => 1,
            Some("hoje") => 0,
            _ => 7,
        };
        return Some((today - Duration::days(back), full_range(&caps)));
    }
    None
}

fn find_time(text: &str, exclude: Option<&Range<usize>>) -> Option<(NaiveTime, Range<usize>)> {
    let overlaps = |r: &Range<usize>| exclude.is_some_and(|e| r.start < e.end && e.start < r.end);

    for caps in RE_RANGE.captures_iter(text) {
        let range = full_range(&caps);
        let matched = caps[0].to_lowercase();
        // "de 2 às 3" sem unidade não é horário
        if overlaps(&range) || !(matched.contains(':') || matched.contains('h')) {
            continue;
        }
        if let Some(t) = hm(&caps[1], caps.get(2).map(|m| m.as_str())) {
            return Some((t, range));
        }
    }
    for caps in RE_HOUR_MIN.captures_iter(text) {
        let range = full_range(&caps);
        if overlaps(&range) || is_duration(&text[..range.start]) {
            continue;
        }
        if let Some(t) = hm(&caps[1], Some(&caps[2])) {
            return Some((t, range));
        }
    }
    for caps in RE_HOUR.captures_iter(text) {
        let range = full_range(&caps);
        if overlaps(&range) {
            continue;
        }
        if let Some(t) = hm(&caps[1], None) {
            return Some((t, range));
        }
    }
    for caps in RE_AS_HOUR.captures_iter(text) {
        let range = full_range(&caps);
        if overlaps(&range) {
            continue;
        }
        if let Some(t) = hm(&caps[1], None) {
            return Some((t, range));
        }
    }
    None
}

fn is_duration(before: &str) -> bool {
    let before = before.trim_end().to_lowercase();
    DURATION_MARKERS
        .iter()
        .any(|m| before == *m || before.ends_with(&format!(" {m}")))
}

fn full_range(caps: &Captures<'_>) -> Range<usize> {
    caps.get(0).map(|m| m.range()).unwrap_or(0..0)
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn hm(h: &str, m: Option<&str>) -> Option<NaiveTime> {
    let m = match m {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(h.parse().ok()?, m, 0)
}

/// "dd/mm" sem ano: se cair no futuro, é do ano anterior.
fn day_month_in_past(today: NaiveDate, d: &str, m: &str) -> Option<NaiveDate> {
    let d: u32 = d.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    let this_year = NaiveDate::from_ymd_opt(today.year(), m, d);
    match this_year {
        Some(date) if date <= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() - 1, m, d),
    }
}

fn remove_spans(text: &str, spans: &mut [Range<usize>]) -> String {
    spans.sort_by_key(|r| r.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans.iter() {
        if span.start > cursor {
            out.push_str(&text[cursor..span.start]);
        }
        out.push(' ');
        cursor = cursor.max(span.end);
    }
    out.push_str(&text[cursor..]);

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = collapsed
        .replace(" ,", ",")
        .replace(" .", ".")
        .replace(" ;", ";");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn at(m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_yesterday_defaults_to_noon() {
        let e = extract("Apresentei o roadmap ontem", now());
        assert_eq!(e.content, "Apresentei o roadmap");
        assert_eq!(e.date, Some(at(3, 9, 12, 0)));
    }

    #[test]
    fn test_anteontem_is_not_ontem() {
        let e = extract("anteontem fechei a sprint", now());
        assert_eq!(e.date, Some(at(3, 8, 12, 0)));
        assert_eq!(e.content, "fechei a sprint");
    }

    #[test]
    fn test_today_with_time() {
        let e = extract("hoje fiz deploy às 14h30", now());
        assert_eq!(e.content, "fiz deploy");
        assert_eq!(e.date, Some(at(3, 10, 14, 30)));
    }

    #[test]
    fn test_today_without_time_uses_now() {
        let e = extract("Hoje revisei 3 PRs", now());
        assert_eq!(e.date, Some(now()));
        assert_eq!(e.content, "revisei 3 PRs");
    }

    #[test]
    fn test_explicit_day_month_with_connector() {
        let e = extract("Corrigi bug crítico em 05/03", now());
        assert_eq!(e.content, "Corrigi bug crítico");
        assert_eq!(e.date, Some(at(3, 5, 12, 0)));
    }

    #[test]
    fn test_future_day_month_rolls_back_a_year() {
        let e = extract("Palestra na meetup 20/12", now());
        let expected = NaiveDate::from_ymd_opt(2025, 12, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(e.date, Some(expected));
    }

    #[test]
    fn test_full_dates() {
        let e = extract("lançamento v2 2026-01-15", now());
        assert_eq!(e.date, Some(at(1, 15, 12, 0)));
        assert_eq!(e.content, "lançamento v2");

        let e = extract("15/01/26 às 9h onboarding", now());
        assert_eq!(e.date, Some(at(1, 15, 9, 0)));
        assert_eq!(e.content, "onboarding");

        let e = extract("workshop 02-03-2026", now());
        assert_eq!(e.date, Some(at(3, 2, 12, 0)));
    }

    #[test]
    fn test_invalid_date_is_ignored() {
        let e = extract("31/02 algo estranho", now());
        assert_eq!(e.date, None);
        assert_eq!(e.content, "31/02 algo estranho");
    }

    #[test]
    fn test_days_ago() {
        let e = extract("há 3 dias mentorei um estagiário", now());
        assert_eq!(e.date, Some(at(3, 7, 12, 0)));
        assert_eq!(e.content, "mentorei um estagiário");

        let e = extract("mentorei 2 dias atrás", now());
        assert_eq!(e.date, Some(at(3, 8, 12, 0)));
    }

    #[test]
    fn test_last_week() {
        let e = extract("Semana passada organizei o hackathon", now());
        assert_eq!(e.date, Some(at(3, 3, 12, 0)));
        assert_eq!(e.content, "organizei o hackathon");
    }

    #[test]
    fn test_time_only_means_today() {
        let e = extract("14:00 daily com o time", now());
        assert_eq!(e.date, Some(at(3, 10, 14, 0)));
        assert_eq!(e.content, "daily com o time");
    }

    #[test]
    fn test_duration_is_not_a_time() {
        let e = extract("reunião de 2h com o cliente", now());
        assert_eq!(e.date, None);
        assert_eq!(e.content, "reunião de 2h com o cliente");
    }

    #[test]
    fn test_bare_hours_are_durations() {
        let e = extract("trabalhei 5h no bug", now());
        assert_eq!(e.date, None);
        assert_eq!(e.content, "trabalhei 5h no bug");

        let e = extract("passei 2h30 pareando com o time", now());
        assert_eq!(e.date, None);
        assert_eq!(e.content, "passei 2h30 pareando com o time");

        let e = extract("revisão às 16h", now());
        assert_eq!(e.date, Some(at(3, 10, 16, 0)));
        assert_eq!(e.content, "revisão");
    }

    #[test]
    fn test_fraction_is_not_a_date() {
        let e = extract("corrigi 1/2 dos bugs", now());
        assert_eq!(e.date, None);
        assert_eq!(e.content, "corrigi 1/2 dos bugs");

        let e = extract("retro no dia 1/2", now());
        assert_eq!(e.date, Some(at(2, 1, 12, 0)));
        assert_eq!(e.content, "retro");
    }

    #[test]
    fn test_time_range_keeps_start() {
        let e = extract("reunião de 14:00 às 15:00", now());
        assert_eq!(e.date, Some(at(3, 10, 14, 0)));
        assert_eq!(e.content, "reunião");

        let e = extract("ontem das 9h às 11h pair programming", now());
        assert_eq!(e.date, Some(at(3, 9, 9, 0)));
        assert_eq!(e.content, "pair programming");
    }

    #[test]
    fn test_only_date_keeps_original_text() {
        let e = extract("ontem", now());
        assert_eq!(e.content, "ontem");
        assert_eq!(e.date, Some(at(3, 9, 12, 0)));
    }

    #[test]
    fn test_no_date() {
        let e = extract("  Escrevi a RFC de cache  ", now());
        assert_eq!(e.date, None);
        assert_eq!(e.content, "Escrevi a RFC de cache");
    }
}
