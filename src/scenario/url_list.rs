use std::path::{Path, PathBuf};

use url::Url;

use crate::args::HttpMethod;
use crate::engine::{Assertion, RequestDescriptor, Scenario};
use crate::error::{ScenarioError, ValidationError};

use super::template::Template;

/// Cycles through a fixed list of URLs by sequence number. Every request
/// carries the same method, headers, body template and assertions.
#[derive(Debug, Clone)]
pub struct UrlListScenario {
    targets: Vec<Template>,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    body: Option<Template>,
    assertions: Vec<Assertion>,
}

impl UrlListScenario {
    /// Validates every URL up front.
    ///
    /// # Errors
    ///
    /// Returns an error when the list is empty or a URL is not an absolute
    /// http(s) URL with a host.
    pub fn new(urls: &[String], method: HttpMethod) -> Result<Self, ValidationError> {
        if urls.is_empty() {
            return Err(ValidationError::MissingUrl);
        }
        let mut targets = Vec::with_capacity(urls.len());
        for raw in urls {
            let template = Template::parse(raw.trim());
            validate_url(&template.render(0))?;
            targets.push(template);
        }
        Ok(Self {
            targets,
            method,
            headers: Vec::new(),
            body: None,
            assertions: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Option<&str>) -> Self {
        self.body = body.map(Template::parse);
        self
    }

    #[must_use]
    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.assertions.push(Assertion::Status(status));
        self
    }

    #[must_use]
    pub fn with_body_contains(mut self, fragment: Option<String>) -> Self {
        if let Some(fragment) = fragment {
            self.assertions.push(Assertion::BodyContains(fragment));
        }
        self
    }

    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    fn target_for(&self, seq: u64) -> Option<&Template> {
        let len = u64::try_from(self.targets.len()).ok()?;
        let index = usize::try_from(seq.checked_rem(len)?).ok()?;
        self.targets.get(index)
    }
}

impl Scenario for UrlListScenario {
    fn name(&self) -> &str {
        "url-list"
    }

    fn build_request(&self, seq: u64) -> Result<RequestDescriptor, ScenarioError> {
        let template = self.target_for(seq).ok_or(ScenarioError::NoTargets)?;
        let target = template.render(seq);
        if template.is_dynamic()
            && let Err(err) = validate_url(&target)
        {
            return Err(ScenarioError::Build {
                seq,
                message: err.to_string(),
            });
        }

        let mut descriptor = RequestDescriptor::new(seq, self.method, target)
            .with_headers(self.headers.clone())
            .with_body(self.body.as_ref().map(|body| body.render(seq)));
        for assertion in &self.assertions {
            descriptor = descriptor.with_assertion(assertion.clone());
        }
        Ok(descriptor)
    }
}

fn validate_url(raw: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(raw).map_err(|err| ValidationError::InvalidUrl {
        url: raw.to_owned(),
        source: err,
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::UrlMissingHost {
            url: raw.to_owned(),
        });
    }
    Ok(())
}

/// Reads newline-delimited URLs, skipping blank lines and `#` comments.
///
/// # Errors
///
/// Returns an error when the file cannot be read or holds no URLs.
pub fn read_url_file(path: &Path) -> Result<Vec<String>, ValidationError> {
    let content = std::fs::read_to_string(path).map_err(|err| ValidationError::ReadUrlFile {
        path: path.to_path_buf(),
        source: err,
    })?;
    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect();
    if urls.is_empty() {
        return Err(ValidationError::UrlFileEmpty {
            path: PathBuf::from(path),
        });
    }
    Ok(urls)
}
