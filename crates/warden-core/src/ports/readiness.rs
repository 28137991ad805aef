//! Ready-signature detection.

/// Decides whether an output line means the managed process is fully up.
pub trait ReadinessProbe: Send + Sync {
    fn is_ready(&self, line: &str) -> bool;
}

impl<F> ReadinessProbe for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_ready(&self, line: &str) -> bool {
        self(line)
    }
}

/// Matches when every configured marker appears in the same line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerReadiness {
    markers: Vec<String>,
}

impl BannerReadiness {
    /// Startup banner markers printed by the default server implementation.
    pub const DEFAULT_MARKERS: [&'static str; 2] = ["Done (", "For help, type"];

    /// Build a probe from custom markers. An empty list never matches.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl Default for BannerReadiness {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MARKERS)
    }
}

impl ReadinessProbe for BannerReadiness {
    fn is_ready(&self, line: &str) -> bool {
        !self.markers.is_empty() && self.markers.iter().all(|m| line.contains(m.as_str()))
    }
}
