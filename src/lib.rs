pub mod collector;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod sink;

/// Common types used across modules
pub mod types {
    use std::fmt;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use smallvec::SmallVec;

    /// Separator between the segments of a metric name
    pub const SEPARATOR: char = '.';

    /// Character substituted for anything that would break the hierarchy or the wire format
    const REPLACEMENT: char = '_';

    /// Hierarchical metric key, e.g. `network.eth0.bytes_sent`.
    ///
    /// Segments never contain the separator: it is replaced on construction,
    /// together with the StatsD-reserved characters.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct MetricName {
        segments: SmallVec<[String; 4]>,
    }

    impl MetricName {
        pub fn new<I, S>(segments: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: AsRef<str>,
        {
            Self {
                segments: segments
                    .into_iter()
                    .map(|s| sanitize_segment(s.as_ref()))
                    .collect(),
            }
        }

        /// Prefix segment derived from the local hostname (`web.example.com` → `web_example_com`)
        pub fn host_prefix(hostname: &str) -> Self {
            Self::new([hostname])
        }

        /// Extend this name with one more segment
        pub fn child(&self, segment: &str) -> Self {
            let mut segments = self.segments.clone();
            segments.push(sanitize_segment(segment));
            Self { segments }
        }

        pub fn segments(&self) -> &[String] {
            &self.segments
        }
    }

    impl fmt::Display for MetricName {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (i, segment) in self.segments.iter().enumerate() {
                if i > 0 {
                    write!(f, "{}", SEPARATOR)?;
                }
                f.write_str(segment)?;
            }
            Ok(())
        }
    }

    fn sanitize_segment(raw: &str) -> String {
        raw.chars()
            .map(|c| match c {
                SEPARATOR | ':' | '|' | '@' => REPLACEMENT,
                c if c.is_whitespace() => REPLACEMENT,
                c => c,
            })
            .collect()
    }

    /// Numeric payload of a gauge
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum MetricValue {
        Integer(u64),
        Float(f64),
    }

    impl MetricValue {
        pub fn is_negative(&self) -> bool {
            matches!(*self, MetricValue::Float(v) if v < 0.0)
        }
    }

    impl From<u64> for MetricValue {
        fn from(v: u64) -> Self {
            MetricValue::Integer(v)
        }
    }

    impl From<f64> for MetricValue {
        fn from(v: f64) -> Self {
            MetricValue::Float(v)
        }
    }

    impl fmt::Display for MetricValue {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                MetricValue::Integer(v) => write!(f, "{}", v),
                MetricValue::Float(v) => write!(f, "{}", v),
            }
        }
    }

    /// One collector's output for one cycle, in insertion order
    #[derive(Debug, Clone, Default)]
    pub struct MetricBatch {
        entries: Vec<(MetricName, MetricValue)>,
    }

    impl MetricBatch {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a gauge; an existing entry with the same name is overwritten in place
        pub fn insert(&mut self, name: MetricName, value: impl Into<MetricValue>) {
            let value = value.into();
            match self.entries.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = value,
                None => self.entries.push((name, value)),
            }
        }

        pub fn get(&self, name: &str) -> Option<MetricValue> {
            self.entries
                .iter()
                .find(|(n, _)| n.to_string() == name)
                .map(|(_, v)| *v)
        }

        pub fn len(&self) -> usize {
            self.entries.len()
        }

        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }

        pub fn iter(&self) -> impl Iterator<Item = &(MetricName, MetricValue)> {
            self.entries.iter()
        }
    }

    /// Start and duration of one scheduler iteration
    #[derive(Debug, Clone, Copy)]
    pub struct CycleTiming {
        pub started_at: DateTime<Utc>,
        pub elapsed: Duration,
    }

    impl CycleTiming {
        /// Elapsed time in whole seconds, truncated
        pub fn elapsed_secs(&self) -> u64 {
            self.elapsed.as_secs()
        }
    }

}
