//! Imagery requests and resolution of their time selector.

use serde::Serialize;
use std::fmt;
use tracing::warn;

use filter_tree::{match_season, Season};
use imagery_common::{DateRange, ImageryError, ImageryResult, MosaicWindow, DEFAULT_DATE_FORMAT};

/// An ad-hoc date range given instead of a season.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    /// strftime format of `start`/`end`; `%Y-%m-%d` when absent.
    pub format: Option<String>,
}

impl DateQuery {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Parse into a range. `None` if incomplete.
    pub fn range(&self) -> Option<ImageryResult<DateRange>> {
        let (start, end) = (self.start.as_ref()?, self.end.as_ref()?);
        let format = self.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
        Some(DateRange::parse(start, end, format))
    }
}

/// A non-fatal problem with a request. Returned alongside results and
/// logged when raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryWarning {
    /// The date query lacked a start or an end and was dropped.
    IncompleteDateQuery,
    /// Both a season and a date query were given; the season was dropped.
    SeasonIgnored { season: String },
    /// The requested season is not configured and was dropped.
    UnknownSeason { season: String },
    /// A group key was not found; retrieval stayed at the nearest ancestor.
    PathNotFound { key: String, at: String },
    /// Several export geometries were given; only `used` applies.
    ExportGeometryOverridden { used: String },
}

impl fmt::Display for QueryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryWarning::IncompleteDateQuery => {
                write!(f, "date query must contain both a start and an end; ignoring it")
            }
            QueryWarning::SeasonIgnored { season } => write!(
                f,
                "season '{}' and a date query are redundant; season ignored in favour of the date query",
                season
            ),
            QueryWarning::UnknownSeason { season } => {
                write!(f, "season '{}' is not configured; ignoring it", season)
            }
            QueryWarning::PathNotFound { key, at } => {
                write!(f, "nested key '{}' not found under {}", key, at)
            }
            QueryWarning::ExportGeometryOverridden { used } => write!(
                f,
                "more than one of dimensions, crs_transform, scale given; using {}",
                used
            ),
        }
    }
}

/// Collects warnings and logs each as it is raised.
#[derive(Debug, Default)]
pub struct Warnings(Vec<QueryWarning>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: QueryWarning) {
        warn!(warning = ?warning, "{}", warning);
        self.0.push(warning);
    }

    pub fn into_vec(self) -> Vec<QueryWarning> {
        self.0
    }
}

/// What to retrieve: a collection, a group path within it, a time selector
/// and optional processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageryRequest {
    pub collection: String,
    pub path: Vec<String>,
    pub season: Option<String>,
    pub date_query: Option<DateQuery>,
    pub bands: Vec<String>,
    pub mosaic: Option<MosaicWindow>,
}

impl ImageryRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            path: Vec::new(),
            season: None,
            date_query: None,
            bands: Vec::new(),
            mosaic: None,
        }
    }

    pub fn path<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn season(mut self, season: impl Into<String>) -> Self {
        self.season = Some(season.into());
        self
    }

    pub fn date_query(mut self, query: DateQuery) -> Self {
        self.date_query = Some(query);
        self
    }

    pub fn bands<I, S>(mut self, bands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bands = bands.into_iter().map(Into::into).collect();
        self
    }

    pub fn mosaic(mut self, window: MosaicWindow) -> Self {
        self.mosaic = Some(window);
        self
    }
}

/// The season a request reads from and, for date queries, the part of the
/// query inside that season.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTime {
    pub season: String,
    pub date_filter: Option<DateRange>,
}

/// Resolve a season name and/or date query against configured seasons.
///
/// Incomplete date queries and unknown seasons are dropped with a warning;
/// a date query wins over a season. With nothing left the request fails.
pub fn resolve_time_selector(
    season: Option<&str>,
    date_query: Option<&DateQuery>,
    seasons: &[Season],
    warnings: &mut Warnings,
) -> ImageryResult<ResolvedTime> {
    let mut season = season;
    let mut date_query = date_query;

    if date_query.is_some_and(|q| !q.is_complete()) {
        warnings.push(QueryWarning::IncompleteDateQuery);
        date_query = None;
    }

    if let (Some(name), Some(_)) = (season, date_query) {
        warnings.push(QueryWarning::SeasonIgnored {
            season: name.to_string(),
        });
        season = None;
    }

    if let Some(name) = season {
        if !seasons.iter().any(|s| s.name == name) {
            warnings.push(QueryWarning::UnknownSeason {
                season: name.to_string(),
            });
            season = None;
        }
    }

    if let Some(range) = date_query.and_then(DateQuery::range) {
        let matched = match_season(&range?, seasons)?;
        return Ok(ResolvedTime {
            season: matched.season,
            date_filter: Some(matched.overlap),
        });
    }

    match season {
        Some(name) => Ok(ResolvedTime {
            season: name.to_string(),
            date_filter: None,
        }),
        None => Err(ImageryError::MissingTimeSelector),
    }
}
