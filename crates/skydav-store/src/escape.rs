//! Percent-encoding of container and object names for request URLs

/// Percent-encode every segment of `path`, keeping the `/` separators
pub fn quote(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Value of the `X-Copy-From` header for `container`/`key`
pub fn copy_source(container: &str, key: &str) -> String {
    format!("/{}/{}", quote(container), quote(key))
}

/// Split an `X-Copy-From` value back into decoded container and key
pub fn parse_copy_source(value: &str) -> Option<(String, String)> {
    let (container, key) = value.trim_start_matches('/').split_once('/')?;
    let container = urlencoding::decode(container).ok()?.into_owned();
    let key = urlencoding::decode(key).ok()?.into_owned();
    if container.is_empty() || key.is_empty() {
        return None;
    }
    Some((container, key))
}
