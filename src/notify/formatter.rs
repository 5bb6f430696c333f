use std::fmt::Write;

use crate::types::{MatchKind, MatchNotification};

/// Render a match as a Telegram Markdown message.
///
/// Optional lines appear only when they carry information: price when known,
/// the struck-through original price only when above the current price,
/// discount and cashback only when non-zero.
pub fn format_notification(n: &MatchNotification) -> String {
    let mut msg = String::new();

    msg.push_str("🎉 *Oferta Encontrada!*\n\n");
    let _ = writeln!(msg, "📦 *Produto:* {}", n.product_name);

    if n.price > 0.0 {
        let _ = writeln!(msg, "💰 *Preço:* R$ {:.2}", n.price);
    }
    if n.original_price > 0.0 && n.original_price > n.price {
        let _ = writeln!(msg, "~~R$ {:.2}~~", n.original_price);
    }
    if n.discount_percentage > 0 {
        let _ = writeln!(msg, "🔥 *Desconto:* {}%", n.discount_percentage);
    }
    if n.cashback_percentage > 0 {
        let _ = writeln!(msg, "💸 *Cashback:* {}%", n.cashback_percentage);
    }

    msg.push_str(match n.match_type {
        MatchKind::Price => "\n✅ *Atingiu seu preço desejado!*",
        MatchKind::Discount => "\n✅ *Atingiu o desconto desejado!*",
    });

    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(price: f64, original: f64, discount: u8, cashback: u8, kind: MatchKind) -> MatchNotification {
        MatchNotification {
            telegram_id: 1,
            product_name: "Kindle Paperwhite".into(),
            price,
            original_price: original,
            discount_percentage: discount,
            cashback_percentage: cashback,
            wishlist_id: 9,
            match_type: kind,
        }
    }

    #[test]
    fn full_message() {
        let text = format_notification(&notification(399.9, 499.0, 20, 5, MatchKind::Discount));
        assert_eq!(
            text,
            "🎉 *Oferta Encontrada!*\n\n\
             📦 *Produto:* Kindle Paperwhite\n\
             💰 *Preço:* R$ 399.90\n\
             ~~R$ 499.00~~\n\
             🔥 *Desconto:* 20%\n\
             💸 *Cashback:* 5%\n\
             \n✅ *Atingiu o desconto desejado!*"
        );
    }

    #[test]
    fn minimal_message_hides_zero_fields() {
        let text = format_notification(&notification(0.0, 0.0, 0, 0, MatchKind::Price));
        assert!(text.contains("Kindle Paperwhite"));
        assert!(!text.contains("Preço"));
        assert!(!text.contains("~~"));
        assert!(!text.contains("Desconto"));
        assert!(!text.contains("Cashback"));
        assert!(text.ends_with("Atingiu seu preço desejado!*"));
    }

    #[test]
    fn original_price_hidden_when_not_higher() {
        let text = format_notification(&notification(500.0, 450.0, 0, 0, MatchKind::Price));
        assert!(text.contains("R$ 500.00"));
        assert!(!text.contains("~~"));
    }
}
