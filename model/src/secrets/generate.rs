use log::warn;
use rand::seq::SliceRandom;
use uuid::Uuid;

const DEFAULT_LENGTH: usize = 32;
const PASSWORD_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
const TOKEN_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Generate a value for a contract `generate` directive. Unknown types fall back to a token.
pub fn generate_value(kind: &str, length: Option<usize>) -> String {
    let length = length.unwrap_or(DEFAULT_LENGTH);
    match kind {
        "password" => random_string(PASSWORD_CHARS, length),
        "token" => random_string(TOKEN_CHARS, length),
        "hex" => random_string(HEX_CHARS, length),
        "uuid" => Uuid::new_v4().to_string(),
        other => {
            warn!("unknown generate type '{}', using a token", other);
            random_string(TOKEN_CHARS, length)
        }
    }
}

fn random_string(charset: &[u8], length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let c = charset.choose(&mut rng).copied().unwrap_or(b'x');
            c as char
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn password_uses_full_charset() {
        let value = generate_value("password", Some(200));
        assert_eq!(value.len(), 200);
        assert!(value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!@#$%^&*".contains(c)));
    }

    #[test]
    fn token_is_alphanumeric() {
        let value = generate_value("token", None);
        assert_eq!(value.len(), 32);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn hex_is_lowercase_hex() {
        let value = generate_value("hex", Some(16));
        assert_eq!(value.len(), 16);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn uuid_parses() {
        let value = generate_value("uuid", None);
        assert!(Uuid::parse_str(&value).is_ok());
    }

    #[test]
    fn unknown_type_falls_back_to_token() {
        let value = generate_value("nonsense", Some(10));
        assert_eq!(value.len(), 10);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
