//! Origin allow-list.
//!
//! Entries are compared ASCII case-insensitively with trailing slashes
//! ignored. A `"*"` entry allows every request, including ones that carry no
//! `Origin` header; otherwise the header is required.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    any: bool,
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut any = false;
        let mut allowed = Vec::new();
        for origin in origins {
            let origin = origin.as_ref().trim();
            if origin == "*" {
                any = true;
            } else if !origin.is_empty() {
                allowed.push(normalize(origin));
            }
        }
        Self { any, allowed }
    }

    pub fn allows_any(&self) -> bool {
        self.any
    }

    pub fn allows(&self, origin: Option<&str>) -> bool {
        if self.any {
            return true;
        }
        match origin {
            Some(origin) => {
                let origin = normalize(origin.trim());
                self.allowed.iter().any(|allowed| *allowed == origin)
            }
            None => false,
        }
    }
}

fn normalize(origin: &str) -> String {
    origin.trim_end_matches('/').to_ascii_lowercase()
}
