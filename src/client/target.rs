use super::ClientError;

/// Turn a channel target into a full `ws://` or `wss://` URL.
///
/// Fully qualified channel URLs are returned unchanged. A bare path is joined
/// to the host of `page_origin`, with `https` pages getting `wss` and `http`
/// pages getting `ws`.
pub fn resolve_channel_url(target: &str, page_origin: &str) -> Result<String, ClientError> {
    let target = target.trim();
    if target.starts_with("ws://") || target.starts_with("wss://") {
        return Ok(target.to_string());
    }

    let (scheme, rest) = page_origin
        .trim()
        .split_once("://")
        .ok_or_else(|| ClientError::InvalidTarget(page_origin.to_string()))?;
    let channel_scheme = match scheme.to_ascii_lowercase().as_str() {
        "https" => "wss",
        "http" => "ws",
        _ => return Err(ClientError::InvalidTarget(page_origin.to_string())),
    };

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(ClientError::InvalidTarget(page_origin.to_string()));
    }

    if target.starts_with('/') {
        Ok(format!("{}://{}{}", channel_scheme, host, target))
    } else {
        Ok(format!("{}://{}/{}", channel_scheme, host, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_on_insecure_page_uses_ws() {
        assert_eq!(
            resolve_channel_url("/ws", "http://localhost:3000").unwrap(),
            "ws://localhost:3000/ws"
        );
    }

    #[test]
    fn bare_path_on_secure_page_uses_wss() {
        assert_eq!(
            resolve_channel_url("/ws", "https://lager.example.com/dashboard").unwrap(),
            "wss://lager.example.com/ws"
        );
        assert_eq!(
            resolve_channel_url("ws", "HTTPS://lager.example.com").unwrap(),
            "wss://lager.example.com/ws"
        );
    }

    #[test]
    fn qualified_channel_url_is_kept() {
        assert_eq!(
            resolve_channel_url("wss://other.example/ws", "http://localhost").unwrap(),
            "wss://other.example/ws"
        );
        assert_eq!(
            resolve_channel_url("ws://127.0.0.1:9/ws", "https://ignored").unwrap(),
            "ws://127.0.0.1:9/ws"
        );
    }

    #[test]
    fn unusable_origin_is_rejected() {
        assert!(resolve_channel_url("/ws", "localhost:3000").is_err());
        assert!(resolve_channel_url("/ws", "ftp://files.example").is_err());
        assert!(resolve_channel_url("/ws", "http://").is_err());
    }
}
