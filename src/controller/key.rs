use base64::{URL_SAFE, decode_config};

const UNCOMPRESSED_P256_LEN: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("encoded key has impossible length {0}")]
    Length(usize),
    #[error("key is not valid base64url: {0}")]
    Encoding(String),
    #[error("key is not an uncompressed P-256 point ({0} bytes)")]
    Point(usize),
}

/// Decodes unpadded (or padded) base64url text. Standard-alphabet `+` and `/`
/// are accepted as well.
pub fn url_base64_decode(text: &str) -> Result<Vec<u8>, KeyError> {
    let text = text.trim();
    let padding = match text.trim_end_matches('=').len() % 4 {
        0 => "",
        2 => "==",
        3 => "=",
        _ => return Err(KeyError::Length(text.len())),
    };
    let normalized: String = text
        .trim_end_matches('=')
        .chars()
        .map(|ch| match ch {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .chain(padding.chars())
        .collect();
    decode_config(normalized, URL_SAFE).map_err(|err| KeyError::Encoding(err.to_string()))
}

/// Turns the server's portable public key into the bytes the push manager
/// expects as `applicationServerKey`.
pub fn application_server_key(text: &str) -> Result<Vec<u8>, KeyError> {
    let bytes = url_base64_decode(text)?;
    if bytes.len() != UNCOMPRESSED_P256_LEN || bytes[0] != 0x04 {
        return Err(KeyError::Point(bytes.len()));
    }
    Ok(bytes)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_APPLICATION_SERVER_KEY;

    #[test]
    fn url_base64_decode__should_pad_both_short_cases() {
        assert_eq!(url_base64_decode("AQ"), Ok(vec![1]));
        assert_eq!(url_base64_decode("AQI"), Ok(vec![1, 2]));
        assert_eq!(url_base64_decode("AQID"), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn url_base64_decode__should_accept_existing_padding_and_standard_alphabet() {
        assert_eq!(url_base64_decode("AQ=="), Ok(vec![1]));
        assert_eq!(url_base64_decode("-_8"), url_base64_decode("+/8"));
        assert_eq!(url_base64_decode("-_8"), Ok(vec![0xfb, 0xff]));
    }

    #[test]
    fn url_base64_decode__should_reject_impossible_length() {
        assert_eq!(url_base64_decode("AQIDB"), Err(KeyError::Length(5)));
    }

    #[test]
    fn url_base64_decode__should_reject_invalid_characters() {
        assert!(matches!(url_base64_decode("A*=="), Err(KeyError::Encoding(_))));
    }

    #[test]
    fn application_server_key__should_decode_default_key_to_uncompressed_point() {
        // When
        let key = application_server_key(DEFAULT_APPLICATION_SERVER_KEY).expect("decode key");

        // Then
        assert_eq!(key.len(), 65);
        assert_eq!(key[0], 0x04);
    }

    #[test]
    fn application_server_key__should_reject_short_keys() {
        assert_eq!(application_server_key("AQID"), Err(KeyError::Point(3)));
    }
}
