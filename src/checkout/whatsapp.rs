//! WhatsApp payment-confirmation message and deep link.
//!
//! The link is informational only: building it never fails a checkout and
//! changes no state. Payment itself is confirmed manually by the admin over
//! WhatsApp.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left unescaped, mirroring JavaScript's encodeURIComponent.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug)]
pub struct PaymentMessage<'a> {
    pub store_name: &'a str,
    pub order_id: &'a str,
    pub product_name: &'a str,
    pub quantity: i64,
    pub total_price: i64,
    pub shipping_address: &'a str,
    /// Present for guest orders; the admin has no account to look up.
    pub guest: Option<GuestContact<'a>>,
}

#[derive(Debug)]
pub struct GuestContact<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
}

/// Group an amount of whole rupiah with dots: 3499000 -> "3.499.000".
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Render the human-readable confirmation message.
pub fn render_message(msg: &PaymentMessage<'_>) -> String {
    let mut text = format!(
        "Halo Admin {}! \u{1F6CD}\u{FE0F}\n\nSaya ingin melakukan pembayaran untuk order:\n\n\
         \u{1F4CB} *Order ID:* {}\n",
        msg.store_name, msg.order_id
    );

    if let Some(guest) = &msg.guest {
        text.push_str(&format!(
            "\u{1F464} *Nama:* {}\n\u{1F4E7} *Email:* {}\n\u{1F4F1} *Phone:* {}\n",
            guest.name, guest.email, guest.phone
        ));
    }

    text.push_str(&format!(
        "\u{1F3F7}\u{FE0F} *Produk:* {}\n\u{1F4E6} *Jumlah:* {}\n\
         \u{1F4B0} *Total Pembayaran:* Rp {}\n\u{1F4CD} *Alamat Pengiriman:* {}\n\n\
         Mohon konfirmasi metode pembayarannya. Terima kasih! \u{1F64F}",
        msg.product_name,
        msg.quantity,
        format_rupiah(msg.total_price),
        msg.shipping_address
    ));

    text
}

/// Build the wa.me deep link with the message URL-encoded into `text`.
pub fn payment_link(whatsapp_number: &str, msg: &PaymentMessage<'_>) -> String {
    let rendered = render_message(msg);
    let encoded = utf8_percent_encode(&rendered, COMPONENT);
    format!("https://wa.me/{}?text={}", whatsapp_number, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> PaymentMessage<'static> {
        PaymentMessage {
            store_name: "ZeyStore",
            order_id: "order-123",
            product_name: "Smartphone XYZ",
            quantity: 2,
            total_price: 200_000,
            shipping_address: "Jl. A",
            guest: None,
        }
    }

    #[test]
    fn test_format_rupiah_grouping() {
        assert_eq!(format_rupiah(0), "0");
        assert_eq!(format_rupiah(999), "999");
        assert_eq!(format_rupiah(1_000), "1.000");
        assert_eq!(format_rupiah(100_000), "100.000");
        assert_eq!(format_rupiah(3_499_000), "3.499.000");
        assert_eq!(format_rupiah(12_999_000), "12.999.000");
        assert_eq!(format_rupiah(1_234_567_890), "1.234.567.890");
    }

    #[test]
    fn test_message_contains_order_details() {
        let text = render_message(&sample_message());
        assert!(text.contains("order-123"));
        assert!(text.contains("Smartphone XYZ"));
        assert!(text.contains("Rp 200.000"));
        assert!(text.contains("Jl. A"));
        assert!(!text.contains("Nama:"));
    }

    #[test]
    fn test_message_includes_guest_contact() {
        let mut msg = sample_message();
        msg.guest = Some(GuestContact {
            name: "Budi",
            email: "budi@example.com",
            phone: "081234567890",
        });
        let text = render_message(&msg);
        assert!(text.contains("*Nama:* Budi"));
        assert!(text.contains("*Email:* budi@example.com"));
        assert!(text.contains("*Phone:* 081234567890"));
    }

    #[test]
    fn test_payment_link_encodes_message() {
        let link = payment_link("6281234567890", &sample_message());
        assert!(link.starts_with("https://wa.me/6281234567890?text="));
        assert!(link.contains("order-123"));
        assert!(link.contains("Smartphone%20XYZ"));
        // Raw spaces and newlines never survive encoding
        assert!(!link.contains(' '));
        assert!(!link.contains('\n'));
    }

    #[test]
    fn test_payment_link_round_trips_through_url_parser() {
        let msg = sample_message();
        let link = payment_link("6281234567890", &msg);
        let url = url::Url::parse(&link).unwrap();
        let text = url
            .query_pairs()
            .find(|(k, _)| k == "text")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(text, render_message(&msg));
    }
}
