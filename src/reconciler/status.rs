//! Order status derivation from free-form broker status and scene strings

use rust_decimal::Decimal;

use crate::common::types::OrderStatus;

/// Secondary "scene" signal attached to some trade events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    /// Explicit terminal marker, overrides the status string
    Terminal(OrderStatus),
    /// A fill happened; completeness comes from the quantities
    Fill,
    /// Nothing usable
    Unknown,
}

/// Normalize a broker status string by substring match
pub fn normalize_status(raw: &str) -> Option<OrderStatus> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    if s.contains("cancel") {
        Some(OrderStatus::Cancelled)
    } else if s.contains("reject") || s.contains("fail") {
        Some(OrderStatus::Rejected)
    } else if s.contains("partial") && s.contains("fill") {
        Some(OrderStatus::PartiallyFilled)
    } else if s.contains("fill") || s.contains("execute") || s.contains("done") {
        Some(OrderStatus::Filled)
    } else if s.contains("submit") || s.contains("working") || s.contains("pending") || s.contains("new") {
        Some(OrderStatus::Working)
    } else {
        None
    }
}

/// Classify a scene string
pub fn classify_scene(raw: &str) -> Scene {
    let s = raw.trim().to_lowercase();
    if s.contains("fail") || s.contains("reject") {
        Scene::Terminal(OrderStatus::Rejected)
    } else if s.contains("cancel") {
        Scene::Terminal(OrderStatus::Cancelled)
    } else if s.contains("fill") && (s.contains("final") || s.contains("all") || s.contains("complete")) {
        Scene::Terminal(OrderStatus::Filled)
    } else if s.contains("fill") {
        Scene::Fill
    } else {
        Scene::Unknown
    }
}

/// Derive the status of an event
///
/// The scene overrides the status string. A fill scene, or a status that is not
/// terminal, defers to traded vs total quantity.
pub fn derive_status(
    status: Option<&str>,
    scene: Option<&str>,
    traded: Option<Decimal>,
    total: Option<Decimal>,
) -> Option<OrderStatus> {
    let mut derived = status.and_then(normalize_status);

    match scene.map(classify_scene) {
        Some(Scene::Terminal(terminal)) => return Some(terminal),
        Some(Scene::Fill) if !matches!(derived, Some(s) if s.is_terminal()) => {
            derived = Some(OrderStatus::PartiallyFilled);
        }
        _ => {}
    }

    if matches!(derived, Some(s) if s.is_terminal()) {
        return derived;
    }

    match (traded, total) {
        (Some(traded), Some(total)) if total > Decimal::ZERO && traded >= total => Some(OrderStatus::Filled),
        (Some(traded), _) if traded > Decimal::ZERO => Some(OrderStatus::PartiallyFilled),
        _ => derived,
    }
}

/// FILLED and CANCELLED trigger a consolidated resync
pub fn triggers_resync(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Filled | OrderStatus::Cancelled)
}
