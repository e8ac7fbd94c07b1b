//! Money formatting and checkout arithmetic.

use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const PRICE_ON_REQUEST: &str = "Sob consulta";

/// Render cents as Brazilian reais, e.g. `123456` -> `R$ 1.234,56`.
pub fn format_brl(cents: i64) -> String {
    let negative = cents < 0;
    let abs = cents.unsigned_abs();
    let reais = (abs / 100).to_string();
    let centavos = abs % 100;

    let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
    for (i, ch) in reais.chars().enumerate() {
        if i > 0 && (reais.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}R$ {grouped},{centavos:02}")
}

/// Storefront label for a product price. Missing or non-positive prices
/// mean "price on request".
pub fn price_label(price_cents: Option<i64>) -> String {
    match price_cents {
        Some(cents) if cents > 0 => format_brl(cents),
        _ => PRICE_ON_REQUEST.to_string(),
    }
}

/// One cart line as read at checkout time.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total_cents: i64,
}

/// Drop non-positive quantities, price each line and sum the total.
/// A missing price counts as zero.
pub fn price_cart(lines: Vec<CartLine>) -> AppResult<PricedCart> {
    let lines: Vec<PricedLine> = lines
        .into_iter()
        .filter(|line| line.quantity > 0)
        .map(|line| {
            let unit = line.unit_price_cents.unwrap_or(0).max(0);
            PricedLine {
                product_id: line.product_id,
                name: line.name,
                quantity: line.quantity,
                unit_price_cents: unit,
                line_total_cents: unit * i64::from(line.quantity),
            }
        })
        .collect();

    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let total_cents = lines.iter().map(|l| l.line_total_cents).sum();
    Ok(PricedCart { lines, total_cents })
}

/// Pre-filled WhatsApp message summarizing an order.
pub fn whatsapp_message(order_id: Uuid, cart: &PricedCart) -> String {
    let mut message = format!("Olá! Gostaria de finalizar o pedido #{order_id}\n\n");
    for line in &cart.lines {
        message.push_str(&format!(
            "- {} x{} ({}) = {}\n",
            line.name,
            line.quantity,
            format_brl(line.unit_price_cents),
            format_brl(line.line_total_cents),
        ));
    }
    message.push_str(&format!("\nTotal: {}", format_brl(cart.total_cents)));
    message
}

pub fn whatsapp_url(number: &str, message: &str) -> String {
    format!("https://wa.me/{number}?text={}", urlencoding::encode(message))
}
