//! URL-to-bytes conversion for results delivered as remote URLs.

use pixshop_core::intent::GenerationResult;

use crate::error::ProviderError;

/// Ensure a result is inline, fetching and decoding it if the provider
/// handed back a URL.
///
/// Failures here are [`ProviderError::Conversion`]: the image exists at
/// the provider, it just could not be delivered.
pub async fn into_inline(
    client: &reqwest::Client,
    result: GenerationResult,
) -> Result<GenerationResult, ProviderError> {
    let GenerationResult::Remote { url } = result else {
        return Ok(result);
    };

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| ProviderError::Conversion(format!("Fetch of {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Conversion(format!(
            "Fetch of {url} returned status {status}"
        )));
    }

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/png")
        .to_string();

    let data = response
        .bytes()
        .await
        .map_err(|e| ProviderError::Conversion(format!("Reading body of {url} failed: {e}")))?
        .to_vec();

    Ok(GenerationResult::Inline { data, mime })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inline_results_pass_through_untouched() {
        let client = reqwest::Client::new();
        let result = into_inline(
            &client,
            GenerationResult::Inline {
                data: vec![1, 2, 3],
                mime: "image/png".into(),
            },
        )
        .await
        .unwrap();

        match result {
            GenerationResult::Inline { data, mime } => {
                assert_eq!(data, vec![1, 2, 3]);
                assert_eq!(mime, "image/png");
            }
            GenerationResult::Remote { .. } => panic!("inline result must stay inline"),
        }
    }
}
