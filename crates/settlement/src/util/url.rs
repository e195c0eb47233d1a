use url::Url;

/// Joins a path onto a base URL, keeping the base URL's path. It doesn't
/// matter whether the base ends with a slash or the path starts with one.
pub fn join(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    base.join(path.trim_start_matches('/'))
}
