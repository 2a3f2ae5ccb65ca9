//! Bot utterances and menus
//!
//! All user-facing text lives here so the transition function only decides
//! *which* message to send.

use super::effect::{MenuOption, Utterance};
use super::event::Intent;
use super::state::{
    ConvContext, IncidentKind, IncidentReport, ListingFraming, Money, OutageDuration, Provider,
    WaterOrder,
};

/// Option id that leaves the provider list
pub const BACK_TO_MENU_ID: &str = "menu";
pub const CONFIRM_ID: &str = "confirm";
pub const CANCEL_ID: &str = "cancel";

const MAIN_MENU: [(&str, &str, Intent); 4] = [
    ("1", "Pedir agua", Intent::RequestWater),
    ("2", "Reportar un problema", Intent::ReportIssue),
    ("3", "Consultar precios", Intent::CheckPrices),
    ("4", "Mis pedidos", Intent::MyOrders),
];

const REPORT_TYPES: [(&str, IncidentKind); 4] = [
    ("1", IncidentKind::Leak),
    ("2", IncidentKind::NoWater),
    ("3", IncidentKind::Contamination),
    ("4", IncidentKind::Other),
];

const DURATIONS: [(&str, OutageDuration); 4] = [
    ("1", OutageDuration::LessThanDay),
    ("2", OutageDuration::OneToThreeDays),
    ("3", OutageDuration::FourToSevenDays),
    ("4", OutageDuration::MoreThanWeek),
];

const ORDERS_MENU: [(&str, &str, Intent); 2] = [
    ("1", "Hacer un pedido nuevo", Intent::NewOrder),
    ("2", "Volver al menú", Intent::BackToMenu),
];

// ============================================================================
// Option tables
// ============================================================================

pub fn main_menu_options() -> Vec<MenuOption> {
    MAIN_MENU
        .iter()
        .map(|(id, label, _)| MenuOption::new(*id, *label))
        .collect()
}

pub fn main_menu_intent(option_id: &str) -> Option<Intent> {
    MAIN_MENU
        .iter()
        .find(|(id, _, _)| *id == option_id)
        .map(|(_, _, intent)| *intent)
}

pub fn report_type_options() -> Vec<MenuOption> {
    REPORT_TYPES
        .iter()
        .map(|(id, kind)| MenuOption::new(*id, kind.label()))
        .collect()
}

pub fn report_kind_for_option(option_id: &str) -> Option<IncidentKind> {
    REPORT_TYPES
        .iter()
        .find(|(id, _)| *id == option_id)
        .map(|(_, kind)| *kind)
}

pub fn duration_options() -> Vec<MenuOption> {
    DURATIONS
        .iter()
        .map(|(id, duration)| MenuOption::new(*id, duration.label()))
        .collect()
}

pub fn duration_for_option(option_id: &str) -> Option<OutageDuration> {
    DURATIONS
        .iter()
        .find(|(id, _)| *id == option_id)
        .map(|(_, duration)| *duration)
}

pub fn confirm_options() -> Vec<MenuOption> {
    vec![
        MenuOption::new(CONFIRM_ID, "Confirmar pedido"),
        MenuOption::new(CANCEL_ID, "Cancelar"),
    ]
}

pub fn orders_menu_options() -> Vec<MenuOption> {
    ORDERS_MENU
        .iter()
        .map(|(id, label, _)| MenuOption::new(*id, *label))
        .collect()
}

pub fn orders_menu_intent(option_id: &str) -> Option<Intent> {
    ORDERS_MENU
        .iter()
        .find(|(id, _, _)| *id == option_id)
        .map(|(_, _, intent)| *intent)
}

/// Providers numbered from 1, followed by the way back to the main menu
pub fn provider_options(providers: &[Provider]) -> Vec<MenuOption> {
    providers
        .iter()
        .enumerate()
        .map(|(index, provider)| MenuOption::new((index + 1).to_string(), provider.name.clone()))
        .chain(std::iter::once(MenuOption::new(
            BACK_TO_MENU_ID,
            "Volver al menú principal",
        )))
        .collect()
}

// ============================================================================
// Main menu
// ============================================================================

pub fn greeting() -> Utterance {
    Utterance::text(
        "¡Hola! Soy el asistente de agua de tu alcaldía. Puedo ayudarte a pedir una pipa, \
         reportar un problema o consultar precios.",
    )
}

pub fn main_menu() -> Utterance {
    Utterance::menu("¿Qué te gustaría hacer? Elige una opción:", main_menu_options())
}

pub fn anything_else() -> Utterance {
    Utterance::menu(
        "¿Hay algo más en lo que pueda ayudarte?",
        main_menu_options(),
    )
}

pub fn not_understood() -> Utterance {
    Utterance::text("Perdón, no entendí tu respuesta.")
}

// ============================================================================
// Order and price flows
// ============================================================================

pub fn ask_delivery_location() -> Utterance {
    Utterance::text("¿En qué colonia o alcaldía necesitas el agua?")
}

pub fn ask_prices_location() -> Utterance {
    Utterance::text("¿Para qué colonia o alcaldía quieres consultar precios?")
}

pub fn ask_location_again() -> Utterance {
    Utterance::text("Necesito una colonia, alcaldía o dirección para continuar.")
}

pub fn provider_listing(
    framing: ListingFraming,
    location: &str,
    providers: &[Provider],
    context: &ConvContext,
) -> Utterance {
    let header = match framing {
        ListingFraming::Order => {
            format!("Estos son los proveedores disponibles para {location}:")
        }
        ListingFraming::Prices => format!(
            "Precios de agua en {location} (pedido de {} litros):",
            context.order_liters
        ),
    };

    let mut lines = vec![header];
    for (index, provider) in providers.iter().enumerate() {
        let number = index + 1;
        let line = match framing {
            ListingFraming::Order => format!(
                "{number}. {} · {}/L · llega en {} min · ★ {:.1}",
                provider.name, provider.price_per_liter, provider.eta_minutes, provider.rating
            ),
            ListingFraming::Prices => format!(
                "{number}. {} · {}/L · total aprox. {}",
                provider.name,
                provider.price_per_liter,
                context.quote(provider).total
            ),
        };
        lines.push(line);
    }
    lines.push(match framing {
        ListingFraming::Order => "Escribe el número del proveedor que prefieras.".to_string(),
        ListingFraming::Prices => "Si quieres pedir a alguno, escribe su número.".to_string(),
    });

    Utterance::menu(lines.join("\n"), provider_options(providers))
}

pub fn no_providers(location: &str) -> Utterance {
    Utterance::text(format!(
        "Lo siento, en este momento no hay proveedores disponibles para {location}. \
         Intenta de nuevo más tarde."
    ))
}

pub fn invalid_selection(count: usize) -> Utterance {
    Utterance::text(format!(
        "No encontré esa opción. Elige un número del 1 al {count}."
    ))
}

pub fn stale_selection() -> Utterance {
    Utterance::text("Ese proveedor ya no está disponible. Esta es la lista actualizada:")
}

pub fn confirm_order(provider: &Provider, location: &str, context: &ConvContext) -> Utterance {
    let quote = context.quote(provider);
    let mut lines = vec![
        "Resumen de tu pedido:".to_string(),
        format!("Proveedor: {}", provider.name),
        format!("Entrega en: {location}"),
        format!("Cantidad: {} litros", context.order_liters),
        format!("Precio: {}", quote.gross),
    ];
    if quote.subsidy > Money::ZERO {
        lines.push(format!("Subsidio: -{}", quote.subsidy));
    }
    lines.push(format!("Total: {}", quote.total));
    lines.push(format!("Llegada estimada: {} min", provider.eta_minutes));
    lines.push("¿Confirmas tu pedido?".to_string());

    Utterance::menu(lines.join("\n"), confirm_options())
}

pub fn order_confirmed(order: &WaterOrder) -> Vec<Utterance> {
    vec![
        Utterance::text(format!("¡Pedido confirmado! Tu folio es {}.", order.folio())),
        Utterance::text(format!(
            "{} llevará {} litros a {}. Total a pagar: {}.",
            order.provider_name, order.quantity_liters, order.location_text, order.total_price
        )),
    ]
}

pub fn order_cancelled() -> Utterance {
    Utterance::text("Pedido cancelado. No se realizó ningún cargo.")
}

pub fn orders_menu(orders: &[WaterOrder]) -> Utterance {
    let content = if orders.is_empty() {
        "Aún no tienes pedidos en esta conversación.".to_string()
    } else {
        let mut lines = vec!["Tus pedidos:".to_string()];
        lines.extend(orders.iter().rev().map(|order| {
            format!(
                "{} · {} · {} litros · {}",
                order.folio(),
                order.provider_name,
                order.quantity_liters,
                order.total_price
            )
        }));
        lines.join("\n")
    };
    Utterance::menu(content, orders_menu_options())
}

// ============================================================================
// Report flow
// ============================================================================

pub fn report_type_menu() -> Utterance {
    Utterance::menu(
        "¿Qué tipo de problema quieres reportar?",
        report_type_options(),
    )
}

pub fn ask_report_location() -> Utterance {
    Utterance::text("¿Dónde ocurre el problema? Escribe la colonia, calle o una referencia.")
}

pub fn duration_menu() -> Utterance {
    Utterance::menu("¿Desde hace cuánto tiempo ocurre?", duration_options())
}

pub fn ask_affected_households() -> Utterance {
    Utterance::text("¿Cuántos hogares están afectados? Escribe un número.")
}

pub fn report_confirmed(report: &IncidentReport) -> Vec<Utterance> {
    vec![
        Utterance::text(format!(
            "Gracias, tu reporte quedó registrado con el folio {}.",
            report.folio()
        )),
        Utterance::text(format!(
            "{} en {} · {} · {} hogar(es) afectado(s).",
            report.kind.label(),
            report.location_text,
            report.duration.label(),
            report.affected_households
        )),
    ]
}

pub fn report_restart() -> Utterance {
    Utterance::text("Faltan datos en tu reporte, empecemos de nuevo.")
}
