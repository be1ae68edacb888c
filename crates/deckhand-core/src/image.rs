use std::fmt;
use std::str::FromStr;

/// A container image coordinate: `[REGISTRY/]NAME:TAG`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: Option<String>,
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    /// An image that only exists in the local engine cache.
    pub fn local(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            registry: None,
            name: name.into(),
            tag: tag.into(),
        }
    }

    pub fn remote(
        registry: impl Into<String>,
        name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: Some(registry.into()),
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Same image, different tag.
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            registry: self.registry.clone(),
            name: self.name.clone(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.registry {
            Some(registry) => write!(f, "{registry}/{}:{}", self.name, self.tag),
            None => write!(f, "{}:{}", self.name, self.tag),
        }
    }
}

impl FromStr for ImageRef {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::InvalidImageRef(s.to_owned());

        // The tag separator is the last ':' after the last '/', so a registry
        // port (`host:5000/name:tag`) is not mistaken for a tag.
        let (registry, rest) = match s.rsplit_once('/') {
            Some((registry, rest)) if !registry.is_empty() => (Some(registry), rest),
            Some(_) => return Err(invalid()),
            None => (None, s),
        };
        let (name, tag) = rest.split_once(':').ok_or_else(invalid)?;
        if name.is_empty() || tag.is_empty() || tag.contains(':') {
            return Err(invalid());
        }

        Ok(Self {
            registry: registry.map(str::to_owned),
            name: name.to_owned(),
            tag: tag.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_remote() {
        let image = ImageRef::remote("123.dkr.ecr.us-east-1.amazonaws.com", "billing", "42");
        assert_eq!(
            image.to_string(),
            "123.dkr.ecr.us-east-1.amazonaws.com/billing:42"
        );
    }

    #[test]
    fn display_local() {
        assert_eq!(
            ImageRef::local("billing", "ci_job-7").to_string(),
            "billing:ci_job-7"
        );
    }

    #[test]
    fn parse_remote() {
        let image: ImageRef = "123.dkr.ecr.us-east-1.amazonaws.com/billing:stage-pass-2401021530"
            .parse()
            .unwrap();
        assert_eq!(
            image.registry.as_deref(),
            Some("123.dkr.ecr.us-east-1.amazonaws.com")
        );
        assert_eq!(image.name, "billing");
        assert_eq!(image.tag, "stage-pass-2401021530");
    }

    #[test]
    fn parse_registry_with_port() {
        let image: ImageRef = "localhost:5000/team/api:v1".parse().unwrap();
        assert_eq!(image.registry.as_deref(), Some("localhost:5000/team"));
        assert_eq!(image.name, "api");
        assert_eq!(image.tag, "v1");
    }

    #[test]
    fn parse_requires_tag() {
        assert!("registry/billing".parse::<ImageRef>().is_err());
        assert!("billing:".parse::<ImageRef>().is_err());
        assert!("/billing:1".parse::<ImageRef>().is_err());
    }

    #[test]
    fn with_tag_keeps_coordinates() {
        let image = ImageRef::remote("reg", "svc", "old").with_tag("new");
        assert_eq!(image.to_string(), "reg/svc:new");
    }
}
