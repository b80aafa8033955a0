//! Query-string helpers shared by the CAS URL builders.
//!
//! Values are form-encoded (`application/x-www-form-urlencoded`), the same
//! escaping CAS servers apply when they echo the `service` parameter back.

use url::Url;

use super::CasError;

/// Merge `params` into the query of the absolute URL `base`.
///
/// Parameters already on `base` keep their order; any key that also appears
/// in `params` is dropped from the existing query and the new value is
/// appended instead. No `?` or `&` is ever duplicated.
pub fn append_params(base: &str, params: &[(&str, &str)]) -> Result<Url, CasError> {
    let mut url = Url::parse(base).map_err(|e| CasError::invalid_url(base, e))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !params.iter().any(|(name, _)| name == key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() && params.is_empty() {
        url.set_query(None);
        return Ok(url);
    }

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .extend_pairs(params.iter());
    Ok(url)
}

/// Remove every `name` parameter from the query of `url`.
///
/// When `name` is not present the URL is returned exactly as given, so a
/// service URL the CAS server already knows is never re-encoded.
pub fn remove_param(url: &str, name: &str) -> Result<String, CasError> {
    let mut parsed = Url::parse(url).map_err(|e| CasError::invalid_url(url, e))?;

    if !parsed.query_pairs().any(|(key, _)| key == name) {
        return Ok(url.to_string());
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    Ok(parsed.to_string())
}

/// Every value of `name` in the query of `url`, decoded.
pub fn query_values(url: &Url, name: &str) -> Vec<String> {
    url.query_pairs()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_params_to_bare_url() {
        let url = append_params(
            "https://cas.example.org/login",
            &[("service", "http://app/cb")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cas.example.org/login?service=http%3A%2F%2Fapp%2Fcb"
        );
    }

    #[test]
    fn test_append_params_merges_existing_query() {
        let url = append_params(
            "https://cas.example.org/login?renew=true&service=old",
            &[("service", "new")],
        )
        .unwrap();
        assert_eq!(query_values(&url, "renew"), vec!["true"]);
        assert_eq!(query_values(&url, "service"), vec!["new"]);
        assert_eq!(url.as_str().matches('?').count(), 1);
    }

    #[test]
    fn test_append_no_params_leaves_no_question_mark() {
        let url = append_params("https://cas.example.org/serviceValidate", &[]).unwrap();
        assert_eq!(url.as_str(), "https://cas.example.org/serviceValidate");
    }

    #[test]
    fn test_append_params_rejects_relative_base() {
        let err = append_params("/login", &[("service", "x")]).unwrap_err();
        assert!(matches!(err, CasError::InvalidUrl { .. }));
    }

    #[test]
    fn test_remove_param_strips_every_occurrence() {
        let out = remove_param("http://app/cb?ticket=ST-1&url=%2Fhome&ticket=ST-2", "ticket")
            .unwrap();
        assert_eq!(out, "http://app/cb?url=%2Fhome");
    }

    #[test]
    fn test_remove_param_only_param() {
        let out = remove_param("http://app/cb?ticket=ST-1", "ticket").unwrap();
        assert_eq!(out, "http://app/cb");
    }

    #[test]
    fn test_remove_param_absent_keeps_url_verbatim() {
        let service = "http://app/cb?url=http://127.0.0.10/?some=parameter";
        assert_eq!(remove_param(service, "ticket").unwrap(), service);
    }
}
