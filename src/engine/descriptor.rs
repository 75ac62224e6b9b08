use crate::args::HttpMethod;

/// Check applied to a target response before an outcome counts as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    Status(u16),
    BodyContains(String),
}

impl Assertion {
    /// Returns a description of the mismatch when the response fails the
    /// check.
    #[must_use]
    pub fn check(&self, response: &TargetResponse) -> Option<String> {
        match self {
            Assertion::Status(expected) => match response.status {
                Some(status) if status == *expected => None,
                Some(status) => Some(format!("status {} (expected {})", status, expected)),
                None => Some(format!("no status (expected {})", expected)),
            },
            Assertion::BodyContains(fragment) => match response.body.as_deref() {
                Some(body) if body.contains(fragment.as_str()) => None,
                Some(_) | None => Some(format!("body missing '{}'", fragment)),
            },
        }
    }
}

/// One unit of work handed from the request source to exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    seq: u64,
    method: HttpMethod,
    target: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    assertions: Vec<Assertion>,
}

impl RequestDescriptor {
    #[must_use]
    pub fn new(seq: u64, method: HttpMethod, target: impl Into<String>) -> Self {
        Self {
            seq,
            method,
            target: target.into(),
            headers: Vec::new(),
            body: None,
            assertions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    #[must_use]
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    /// Whether any assertion inspects the response body.
    #[must_use]
    pub fn needs_body(&self) -> bool {
        self.assertions
            .iter()
            .any(|assertion| matches!(assertion, Assertion::BodyContains(_)))
    }
}

/// What a target client reports for one executed descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetResponse {
    pub success: bool,
    pub status: Option<u16>,
    pub body: Option<String>,
}

impl TargetResponse {
    #[must_use]
    pub const fn success() -> Self {
        Self {
            success: true,
            status: None,
            body: None,
        }
    }

    #[must_use]
    pub const fn failure() -> Self {
        Self {
            success: false,
            status: None,
            body: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }
}
