use anyhow::Result;

use crate::organizer::config::YearPolicy;
use crate::organizer::key::{extract_year, normalize_name, title_for_query_and_key};
use crate::organizer::metadata::{MetadataRecord, MetadataSource};
use crate::organizer::provider::MetadataProvider;
use crate::organizer::store::MetadataCache;

/// Resolves filename stems to metadata records through the cache and the providers.
pub struct Resolver {
    providers: Vec<Box<dyn MetadataProvider>>,
    cache: MetadataCache,
    year_policy: YearPolicy,
}

/// Outcome of resolving one stem.
#[derive(Debug, Default)]
pub struct Resolution {
    pub record: Option<MetadataRecord>,
    /// True when the record came from the cache without any provider call.
    pub cached: bool,
    /// Providers that failed before a result was found.
    pub provider_errors: Vec<(MetadataSource, anyhow::Error)>,
}

impl Resolver {
    /// Create a resolver that queries providers in the given order.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn MetadataProvider>>, cache: MetadataCache, year_policy: YearPolicy) -> Self {
        Self {
            providers,
            cache,
            year_policy,
        }
    }

    /// Resolve the given filename stem.
    ///
    /// A cached stem is returned as is. Otherwise each provider is asked in turn
    /// and the first hit is normalized, cached and flushed to disk before returning.
    /// Misses are not cached so a later run tries again.
    ///
    /// # Errors
    /// Returns an error only if a new record cannot be written to the cache.
    pub fn resolve(&mut self, stem: &str) -> Result<Resolution> {
        if let Some(record) = self.cache.get(stem) {
            return Ok(Resolution {
                record: Some(record.clone()),
                cached: true,
                provider_errors: Vec::new(),
            });
        }

        let year = extract_year(stem);
        let (search_title, _) = title_for_query_and_key(stem);

        let mut resolution = Resolution::default();
        for provider in &self.providers {
            match provider.lookup(&search_title, year.as_deref()) {
                Ok(Some(found)) => {
                    resolution.record = Some(found);
                    break;
                }
                Ok(None) => {}
                Err(error) => resolution.provider_errors.push((provider.source(), error)),
            }
        }

        if let Some(found) = resolution.record.take() {
            let record = MetadataRecord {
                title: normalize_name(&found.title),
                year: match self.year_policy {
                    YearPolicy::Filename => year,
                    YearPolicy::ProviderFallback => year.or(found.year),
                },
                ..found
            };
            self.cache.insert(stem.to_string(), record.clone())?;
            resolution.record = Some(record);
        }

        Ok(resolution)
    }

    /// Stop persisting new cache entries. Used for preview runs.
    pub fn detach_cache(&mut self) {
        self.cache.detach();
    }

    #[must_use]
    pub const fn cache(&self) -> &MetadataCache {
        &self.cache
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use anyhow::{Result, bail};

    use crate::organizer::metadata::{MetadataRecord, MetadataSource};
    use crate::organizer::provider::MetadataProvider;

    /// Provider answering from a fixed title table and counting calls.
    pub struct MockProvider {
        pub source: MetadataSource,
        pub titles: HashMap<String, MetadataRecord>,
        pub fail: bool,
        pub calls: Rc<RefCell<Vec<(String, Option<String>)>>>,
    }

    impl MockProvider {
        pub fn new(source: MetadataSource) -> Self {
            Self {
                source,
                titles: HashMap::new(),
                fail: false,
                calls: Rc::new(RefCell::new(Vec::new())),
            }
        }

        pub fn with_title(mut self, query: &str, id: u64, title: &str, year: Option<&str>) -> Self {
            let id = match self.source {
                MetadataSource::Tmdb => id.into(),
                MetadataSource::Omdb => format!("tt{id:07}").as_str().into(),
            };
            self.titles.insert(
                query.to_string(),
                MetadataRecord {
                    source: self.source,
                    id,
                    title: title.to_string(),
                    year: year.map(ToString::to_string),
                },
            );
            self
        }

        pub const fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        pub fn call_log(&self) -> Rc<RefCell<Vec<(String, Option<String>)>>> {
            Rc::clone(&self.calls)
        }
    }

    impl MetadataProvider for MockProvider {
        fn source(&self) -> MetadataSource {
            self.source
        }

        fn lookup(&self, title: &str, year: Option<&str>) -> Result<Option<MetadataRecord>> {
            self.calls
                .borrow_mut()
                .push((title.to_string(), year.map(ToString::to_string)));
            if self.fail {
                bail!("connection refused");
            }
            Ok(self.titles.get(title).cloned())
        }
    }
}
