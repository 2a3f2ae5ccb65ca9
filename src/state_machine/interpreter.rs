//! Input interpretation
//!
//! Turns a raw user turn into a [`Signal`] using only the current state and
//! the options it offers. Precedence: an exact option id wins over a keyword
//! match, which wins over a raw capture.

use super::effect::MenuOption;
use super::event::{Intent, Signal, UserInput};
use super::state::{ConvState, IncidentKind, OutageDuration};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Household count used when the capture holds no usable number
pub const DEFAULT_AFFECTED_HOUSEHOLDS: u32 = 1;

/// Triggers this short only match a whole word ("si" must not fire in "sin")
const SHORT_TRIGGER_CHARS: usize = 3;

type KeywordTable = &'static [(Intent, &'static [&'static str])];

// Tables are checked in order; the first intent with a matching phrase wins.
// Phrases are written already normalized (lower case, no accents) and match
// anywhere in the input. A leading `^` anchors a phrase to the first word.

const MAIN_MENU_KEYWORDS: KeywordTable = &[
    (Intent::ReportIssue, &["reportar", "reporte", "problema", "fuga", "queja"]),
    (Intent::CheckPrices, &["precio", "costo", "cuanto cuesta", "tarifa"]),
    (Intent::MyOrders, &["mi pedido", "pedidos"]),
    (Intent::RequestWater, &["pedir", "pido", "agua", "pipa", "solicitar"]),
];

const CONFIRM_KEYWORDS: KeywordTable = &[
    (Intent::Cancel, &["cancela", "^no"]),
    (Intent::Confirm, &["confirm", "si", "ok", "acepto", "de acuerdo"]),
];

const PROVIDER_LIST_KEYWORDS: KeywordTable = &[(
    Intent::BackToMenu,
    &["menu", "volver", "regresar", "cancelar"],
)];

const ORDERS_MENU_KEYWORDS: KeywordTable = &[
    (Intent::BackToMenu, &["menu", "volver", "regresar"]),
    (Intent::NewOrder, &["nuevo", "otro pedido", "pedir"]),
];

const REPORT_TYPE_KEYWORDS: KeywordTable = &[
    (
        Intent::Incident(IncidentKind::NoWater),
        &["sin agua", "no hay agua", "no llega", "sin servicio"],
    ),
    (
        Intent::Incident(IncidentKind::Contamination),
        &["contaminada", "contaminacion", "sucia", "turbia", "mal olor"],
    ),
    (Intent::Incident(IncidentKind::Leak), &["fuga", "gotea", "escurre"]),
    (
        Intent::Incident(IncidentKind::Infrastructure),
        &["tuberia", "infraestructura", "drenaje", "coladera"],
    ),
    (Intent::Incident(IncidentKind::Other), &["otro", "otra"]),
];

const DURATION_KEYWORDS: KeywordTable = &[
    (
        Intent::Duration(OutageDuration::MoreThanWeek),
        &["mas de una semana", "semanas", "meses", "mes"],
    ),
    (
        Intent::Duration(OutageDuration::FourToSevenDays),
        &["una semana", "cuatro dias", "cinco dias", "seis dias", "siete dias"],
    ),
    (
        Intent::Duration(OutageDuration::OneToThreeDays),
        &["ayer", "un dia", "dos dias", "tres dias"],
    ),
    (Intent::Duration(OutageDuration::LessThanDay), &["hoy", "horas"]),
];

/// What kind of free-form input a state accepts
enum Capture {
    None,
    Text,
    /// A 1-based position in a list of this length
    Index(usize),
}

fn keywords_for(state: &ConvState) -> KeywordTable {
    match state {
        ConvState::Welcome | ConvState::MainMenu => MAIN_MENU_KEYWORDS,
        ConvState::ConfirmOrder => CONFIRM_KEYWORDS,
        ConvState::ShowProviders { .. } => PROVIDER_LIST_KEYWORDS,
        ConvState::OrdersMenu => ORDERS_MENU_KEYWORDS,
        ConvState::ReportType => REPORT_TYPE_KEYWORDS,
        ConvState::ReportDuration => DURATION_KEYWORDS,
        _ => &[],
    }
}

fn capture_for(state: &ConvState) -> Capture {
    match state {
        ConvState::RequestLocation
        | ConvState::PricesLocation
        | ConvState::ReportLocation
        | ConvState::ReportAffected => Capture::Text,
        ConvState::ShowProviders { shown, .. } => Capture::Index(shown.len()),
        _ => Capture::None,
    }
}

/// Interpret one raw turn against the current state's vocabulary.
///
/// Pure: the result depends only on the arguments.
pub fn interpret(state: &ConvState, input: &UserInput, options: &[MenuOption]) -> Signal {
    let raw = input.raw().trim();

    if options.iter().any(|option| option.id == raw) {
        return Signal::OptionSelected(raw.to_string());
    }

    let text = normalize(raw);
    if let Some(intent) = match_keywords(keywords_for(state), &text) {
        return Signal::KeywordMatch(intent);
    }

    match capture_for(state) {
        Capture::Text if !raw.is_empty() => Signal::RawCapture(raw.to_string()),
        Capture::Index(len) => match parse_index(raw) {
            Some(index) if (1..=len).contains(&index) => Signal::RawCapture(index.to_string()),
            _ => Signal::Unrecognized,
        },
        _ => Signal::Unrecognized,
    }
}

/// Parse a 1-based list position such as `2`, `2.` or `#2`
pub fn parse_index(raw: &str) -> Option<usize> {
    raw.trim()
        .trim_start_matches('#')
        .trim_end_matches(['.', ')'])
        .trim()
        .parse()
        .ok()
}

/// Household count from free text: the first run of digits, or
/// [`DEFAULT_AFFECTED_HOUSEHOLDS`] when there is none (or it is zero or
/// does not fit).
pub fn capture_count(raw: &str) -> u32 {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();

    match digits.parse::<u32>() {
        Ok(count) if count > 0 => count,
        _ => DEFAULT_AFFECTED_HOUSEHOLDS,
    }
}

fn match_keywords(table: KeywordTable, text: &str) -> Option<Intent> {
    table
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|phrase| contains_phrase(text, phrase)))
        .map(|(intent, _)| *intent)
}

fn contains_phrase(text: &str, phrase: &str) -> bool {
    if let Some(word) = phrase.strip_prefix('^') {
        return text.split(' ').next() == Some(word);
    }
    if phrase.chars().count() <= SHORT_TRIGGER_CHARS {
        return text.split(' ').any(|word| word == phrase);
    }
    text.contains(phrase)
}

/// Lower-case, strip diacritics (precomposed or combining) and collapse
/// everything that is not alphanumeric into single spaces
fn normalize(raw: &str) -> String {
    let folded: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
