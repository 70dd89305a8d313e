//! Action tokens: the bounded opaque strings carried by every interactive
//! button.
//!
//! A token is a verb followed by its fixed arguments, joined with `_`. Verbs
//! that carry free text (a keyword or a chapter label) append it
//! percent-encoded as a *tail*; a verb may also place fixed arguments after the
//! tail. Decoding identifies the verb from [`Verb::ALL`], takes leading
//! arguments from the front and trailing arguments from the back, and rejoins
//! whatever remains as the tail. Fixed arguments never contain the delimiter,
//! so a tail containing `_` still decodes unambiguously.
//!
//! ```text
//! search_page_0_all_data%20structures
//! └── verb ─┘ │  │   └── tail ───────┘
//!           page filter
//!
//! search_chapter_Chapter%201_CS101
//! └─── verb ───┘ └─ tail ──┘ └ trailing
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator between token segments.
pub const DELIMITER: char = '_';

/// Default byte ceiling, the chat transport's callback-data limit.
pub const DEFAULT_MAX_BYTES: usize = 64;

/// Highest academic year a course may declare.
pub const MAX_YEAR: u8 = 6;

/// Highest term a course may declare.
pub const MAX_TERM: u8 = 2;

/// Errors from encoding or decoding action tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("unknown verb in token {0:?}")]
    UnknownVerb(String),

    #[error("verb {verb} expects {expected} fixed argument(s), got {actual}")]
    Arity {
        verb: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("verb {0} requires a tail")]
    MissingTail(&'static str),

    #[error("verb {0} does not take a tail")]
    UnexpectedTail(&'static str),

    #[error("empty argument for verb {0}")]
    EmptyArgument(&'static str),

    #[error("argument {0:?} contains the token delimiter")]
    DelimiterInArgument(String),

    #[error("bad argument {value:?} for verb {verb}: {reason}")]
    BadArgument {
        verb: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid percent-encoding in tail: {0}")]
    InvalidPercentEncoding(String),

    #[error("token is {actual} bytes, limit is {limit}")]
    TooLong { limit: usize, actual: usize },
}

/// How many fixed arguments a verb carries and whether it has a tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub leading: usize,
    pub tail: bool,
    pub trailing: usize,
}

impl Arity {
    const fn new(leading: usize, tail: bool, trailing: usize) -> Self {
        Self {
            leading,
            tail,
            trailing,
        }
    }

    /// Total number of fixed arguments.
    pub const fn fixed(&self) -> usize {
        self.leading + self.trailing
    }
}

/// Every command a token can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Browse,
    Restart,
    Institution,
    SubUnit,
    Year,
    Term,
    Course,
    Chapter,
    Document,
    SearchPage,
    SearchFilter,
    SearchCourse,
    SearchChapter,
    SearchBack,
    FavoriteAdd,
    FavoriteRemove,
    FavoritePage,
    HistoryPage,
    HistoryClear,
    Directory,
    Noop,
}

impl Verb {
    /// The verb table.
    pub const ALL: [Verb; 21] = [
        Verb::Browse,
        Verb::Restart,
        Verb::Institution,
        Verb::SubUnit,
        Verb::Year,
        Verb::Term,
        Verb::Course,
        Verb::Chapter,
        Verb::Document,
        Verb::SearchPage,
        Verb::SearchFilter,
        Verb::SearchCourse,
        Verb::SearchChapter,
        Verb::SearchBack,
        Verb::FavoriteAdd,
        Verb::FavoriteRemove,
        Verb::FavoritePage,
        Verb::HistoryPage,
        Verb::HistoryClear,
        Verb::Directory,
        Verb::Noop,
    ];

    /// Name of the verb on the wire.
    pub const fn wire(self) -> &'static str {
        match self {
            Verb::Browse => "browse",
            Verb::Restart => "restart",
            Verb::Institution => "inst",
            Verb::SubUnit => "unit",
            Verb::Year => "year",
            Verb::Term => "term",
            Verb::Course => "course",
            Verb::Chapter => "chapter",
            Verb::Document => "doc",
            Verb::SearchPage => "search_page",
            Verb::SearchFilter => "search_filter",
            Verb::SearchCourse => "search_course",
            Verb::SearchChapter => "search_chapter",
            Verb::SearchBack => "search_back",
            Verb::FavoriteAdd => "fav_add",
            Verb::FavoriteRemove => "fav_remove",
            Verb::FavoritePage => "fav_page",
            Verb::HistoryPage => "hist_page",
            Verb::HistoryClear => "hist_clear",
            Verb::Directory => "units",
            Verb::Noop => "noop",
        }
    }

    pub const fn arity(self) -> Arity {
        match self {
            Verb::Browse
            | Verb::Restart
            | Verb::SearchBack
            | Verb::HistoryClear
            | Verb::Directory
            | Verb::Noop => Arity::new(0, false, 0),
            Verb::Institution
            | Verb::SubUnit
            | Verb::Year
            | Verb::Term
            | Verb::Course
            | Verb::Document
            | Verb::SearchCourse
            | Verb::FavoriteAdd
            | Verb::FavoriteRemove
            | Verb::FavoritePage
            | Verb::HistoryPage => Arity::new(1, false, 0),
            Verb::Chapter => Arity::new(0, true, 0),
            Verb::SearchPage => Arity::new(2, true, 0),
            Verb::SearchFilter => Arity::new(1, true, 0),
            Verb::SearchChapter => Arity::new(0, true, 1),
        }
    }

    /// Identify the verb a token starts with.
    ///
    /// Picks the longest wire name that is followed by the delimiter or by the
    /// end of the token, and returns it with the remainder after the delimiter.
    fn split_prefix(token: &str) -> Option<(Verb, Option<&str>)> {
        Verb::ALL
            .iter()
            .filter_map(|verb| {
                let rest = token.strip_prefix(verb.wire())?;
                if rest.is_empty() {
                    Some((*verb, None))
                } else {
                    rest.strip_prefix(DELIMITER).map(|rest| (*verb, Some(rest)))
                }
            })
            .max_by_key(|(verb, _)| verb.wire().len())
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}

/// A decoded token before typed interpretation.
///
/// `args` holds the leading arguments followed by the trailing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub verb: Verb,
    pub args: Vec<String>,
    pub tail: Option<String>,
}

/// Encoder/decoder bound to a byte ceiling.
#[derive(Debug, Clone, Copy)]
pub struct TokenCodec {
    max_bytes: usize,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

impl TokenCodec {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Build a token from a verb, its fixed arguments and an optional tail.
    ///
    /// Fails closed with [`EncodingError::TooLong`] instead of producing a
    /// token the transport would truncate.
    pub fn encode<S: AsRef<str>>(
        &self,
        verb: Verb,
        args: &[S],
        tail: Option<&str>,
    ) -> Result<String, EncodingError> {
        let arity = verb.arity();
        if args.len() != arity.fixed() {
            return Err(EncodingError::Arity {
                verb: verb.wire(),
                expected: arity.fixed(),
                actual: args.len(),
            });
        }
        match (arity.tail, tail.is_some()) {
            (true, false) => return Err(EncodingError::MissingTail(verb.wire())),
            (false, true) => return Err(EncodingError::UnexpectedTail(verb.wire())),
            _ => {}
        }
        for arg in args {
            check_fixed_arg(verb, arg.as_ref())?;
        }

        let (leading, trailing) = args.split_at(arity.leading);
        let mut token = String::from(verb.wire());
        for arg in leading {
            token.push(DELIMITER);
            token.push_str(arg.as_ref());
        }
        if let Some(tail) = tail {
            token.push(DELIMITER);
            token.push_str(&urlencoding::encode(tail));
        }
        for arg in trailing {
            token.push(DELIMITER);
            token.push_str(arg.as_ref());
        }

        if token.len() > self.max_bytes {
            return Err(EncodingError::TooLong {
                limit: self.max_bytes,
                actual: token.len(),
            });
        }
        Ok(token)
    }

    /// Split a token back into verb, fixed arguments and tail.
    pub fn decode(&self, token: &str) -> Result<RawToken, EncodingError> {
        if token.len() > self.max_bytes {
            return Err(EncodingError::TooLong {
                limit: self.max_bytes,
                actual: token.len(),
            });
        }

        let (verb, rest) =
            Verb::split_prefix(token).ok_or_else(|| EncodingError::UnknownVerb(token.to_string()))?;
        let arity = verb.arity();
        let segments: Vec<&str> = match rest {
            Some(rest) => rest.split(DELIMITER).collect(),
            None => Vec::new(),
        };

        let needed = arity.fixed() + usize::from(arity.tail);
        let count_ok = if arity.tail {
            segments.len() >= needed
        } else {
            segments.len() == needed
        };
        if !count_ok {
            return Err(EncodingError::Arity {
                verb: verb.wire(),
                expected: arity.fixed(),
                actual: segments.len().saturating_sub(usize::from(arity.tail)),
            });
        }

        let (leading, rest) = segments.split_at(arity.leading);
        let (middle, trailing) = rest.split_at(rest.len() - arity.trailing);

        let mut args = Vec::with_capacity(arity.fixed());
        for arg in leading.iter().chain(trailing) {
            if arg.is_empty() {
                return Err(EncodingError::EmptyArgument(verb.wire()));
            }
            args.push((*arg).to_string());
        }

        let tail = if arity.tail {
            let joined = middle.join(&DELIMITER.to_string());
            let decoded = urlencoding::decode(&joined)
                .map_err(|e| EncodingError::InvalidPercentEncoding(e.to_string()))?;
            Some(decoded.into_owned())
        } else {
            None
        };

        Ok(RawToken { verb, args, tail })
    }

    /// Encode a typed action.
    pub fn encode_action(&self, action: &Action) -> Result<String, EncodingError> {
        let raw = action.to_raw();
        self.encode(raw.verb, &raw.args, raw.tail.as_deref())
    }

    /// Decode a token into a typed action.
    pub fn decode_action(&self, token: &str) -> Result<Action, EncodingError> {
        Action::from_raw(self.decode(token)?)
    }
}

fn check_fixed_arg(verb: Verb, arg: &str) -> Result<(), EncodingError> {
    if arg.is_empty() {
        return Err(EncodingError::EmptyArgument(verb.wire()));
    }
    if arg.contains(DELIMITER) {
        return Err(EncodingError::DelimiterInArgument(arg.to_string()));
    }
    Ok(())
}

/// Which entity types a keyword search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchFilter {
    All,
    Courses,
    Chapters,
    Resources,
}

impl SearchFilter {
    pub const ALL: [SearchFilter; 4] = [
        SearchFilter::All,
        SearchFilter::Courses,
        SearchFilter::Chapters,
        SearchFilter::Resources,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SearchFilter::All => "all",
            SearchFilter::Courses => "courses",
            SearchFilter::Chapters => "chapters",
            SearchFilter::Resources => "resources",
        }
    }

    pub fn includes_courses(self) -> bool {
        matches!(self, SearchFilter::All | SearchFilter::Courses)
    }

    pub fn includes_chapters(self) -> bool {
        matches!(self, SearchFilter::All | SearchFilter::Chapters)
    }

    pub fn includes_resources(self) -> bool {
        matches!(self, SearchFilter::All | SearchFilter::Resources)
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchFilter::ALL
            .into_iter()
            .find(|filter| filter.as_str() == s)
            .ok_or_else(|| format!("unknown filter {s:?}"))
    }
}

/// A typed interactive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Browse,
    Restart,
    Institution(String),
    SubUnit(String),
    Year(u8),
    Term(u8),
    Course(String),
    Chapter(String),
    Document(String),
    SearchPage {
        page: usize,
        filter: SearchFilter,
        keyword: String,
    },
    SearchFilter {
        filter: SearchFilter,
        keyword: String,
    },
    SearchCourse(String),
    SearchChapter {
        label: String,
        course: String,
    },
    SearchBack,
    FavoriteAdd(String),
    FavoriteRemove(String),
    FavoritePage(usize),
    HistoryPage(usize),
    HistoryClear,
    Directory,
    Noop,
}

impl Action {
    pub fn verb(&self) -> Verb {
        match self {
            Action::Browse => Verb::Browse,
            Action::Restart => Verb::Restart,
            Action::Institution(_) => Verb::Institution,
            Action::SubUnit(_) => Verb::SubUnit,
            Action::Year(_) => Verb::Year,
            Action::Term(_) => Verb::Term,
            Action::Course(_) => Verb::Course,
            Action::Chapter(_) => Verb::Chapter,
            Action::Document(_) => Verb::Document,
            Action::SearchPage { .. } => Verb::SearchPage,
            Action::SearchFilter { .. } => Verb::SearchFilter,
            Action::SearchCourse(_) => Verb::SearchCourse,
            Action::SearchChapter { .. } => Verb::SearchChapter,
            Action::SearchBack => Verb::SearchBack,
            Action::FavoriteAdd(_) => Verb::FavoriteAdd,
            Action::FavoriteRemove(_) => Verb::FavoriteRemove,
            Action::FavoritePage(_) => Verb::FavoritePage,
            Action::HistoryPage(_) => Verb::HistoryPage,
            Action::HistoryClear => Verb::HistoryClear,
            Action::Directory => Verb::Directory,
            Action::Noop => Verb::Noop,
        }
    }

    pub fn to_raw(&self) -> RawToken {
        let (args, tail) = match self {
            Action::Browse
            | Action::Restart
            | Action::SearchBack
            | Action::HistoryClear
            | Action::Directory
            | Action::Noop => (Vec::new(), None),
            Action::Institution(id)
            | Action::SubUnit(id)
            | Action::Course(id)
            | Action::Document(id)
            | Action::SearchCourse(id)
            | Action::FavoriteAdd(id)
            | Action::FavoriteRemove(id) => (vec![id.clone()], None),
            Action::FavoritePage(page) | Action::HistoryPage(page) => (vec![page.to_string()], None),
            Action::Year(n) | Action::Term(n) => (vec![n.to_string()], None),
            Action::Chapter(label) => (Vec::new(), Some(label.clone())),
            Action::SearchPage {
                page,
                filter,
                keyword,
            } => (
                vec![page.to_string(), filter.as_str().to_string()],
                Some(keyword.clone()),
            ),
            Action::SearchFilter { filter, keyword } => {
                (vec![filter.as_str().to_string()], Some(keyword.clone()))
            }
            Action::SearchChapter { label, course } => (vec![course.clone()], Some(label.clone())),
        };
        RawToken {
            verb: self.verb(),
            args,
            tail,
        }
    }

    pub fn from_raw(raw: RawToken) -> Result<Self, EncodingError> {
        let verb = raw.verb;
        let mut args = raw.args.into_iter();
        let mut next_arg = || {
            args.next().ok_or(EncodingError::Arity {
                verb: verb.wire(),
                expected: verb.arity().fixed(),
                actual: 0,
            })
        };
        let tail = || {
            raw.tail
                .clone()
                .ok_or(EncodingError::MissingTail(verb.wire()))
        };

        let action = match verb {
            Verb::Browse => Action::Browse,
            Verb::Restart => Action::Restart,
            Verb::SearchBack => Action::SearchBack,
            Verb::HistoryClear => Action::HistoryClear,
            Verb::Directory => Action::Directory,
            Verb::Noop => Action::Noop,
            Verb::Institution => Action::Institution(next_arg()?),
            Verb::SubUnit => Action::SubUnit(next_arg()?),
            Verb::Course => Action::Course(next_arg()?),
            Verb::Document => Action::Document(next_arg()?),
            Verb::SearchCourse => Action::SearchCourse(next_arg()?),
            Verb::FavoriteAdd => Action::FavoriteAdd(next_arg()?),
            Verb::FavoriteRemove => Action::FavoriteRemove(next_arg()?),
            Verb::FavoritePage => Action::FavoritePage(parse_page(verb, &next_arg()?)?),
            Verb::HistoryPage => Action::HistoryPage(parse_page(verb, &next_arg()?)?),
            Verb::Year => Action::Year(parse_bounded(verb, &next_arg()?, MAX_YEAR)?),
            Verb::Term => Action::Term(parse_bounded(verb, &next_arg()?, MAX_TERM)?),
            Verb::Chapter => Action::Chapter(tail()?),
            Verb::SearchPage => {
                let page = parse_page(verb, &next_arg()?)?;
                Action::SearchPage {
                    page,
                    filter: parse_filter(verb, &next_arg()?)?,
                    keyword: tail()?,
                }
            }
            Verb::SearchFilter => Action::SearchFilter {
                filter: parse_filter(verb, &next_arg()?)?,
                keyword: tail()?,
            },
            Verb::SearchChapter => Action::SearchChapter {
                course: next_arg()?,
                label: tail()?,
            },
        };
        Ok(action)
    }
}

fn parse_bounded(verb: Verb, value: &str, max: u8) -> Result<u8, EncodingError> {
    match value.parse::<u8>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ => Err(EncodingError::BadArgument {
            verb: verb.wire(),
            value: value.to_string(),
            reason: format!("expected an integer in 1..={max}"),
        }),
    }
}

fn parse_page(verb: Verb, value: &str) -> Result<usize, EncodingError> {
    value.parse().map_err(|_| EncodingError::BadArgument {
        verb: verb.wire(),
        value: value.to_string(),
        reason: "page must be a non-negative integer".to_string(),
    })
}

fn parse_filter(verb: Verb, value: &str) -> Result<SearchFilter, EncodingError> {
    value.parse().map_err(|reason| EncodingError::BadArgument {
        verb: verb.wire(),
        value: value.to_string(),
        reason,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_fixed_arg() -> impl Strategy<Value = String> {
        "[A-Za-z0-9.-]{1,8}"
    }

    fn arb_tail() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z_ ]{0,12}",
            "\\PC{0,10}",
            Just("Kapitel_ü_中文".to_string()),
        ]
    }

    fn arb_verb() -> impl Strategy<Value = Verb> {
        prop::sample::select(Verb::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn raw_round_trip(
            verb in arb_verb(),
            args in prop::collection::vec(arb_fixed_arg(), 2),
            tail in arb_tail(),
        ) {
            let codec = TokenCodec::new(4096);
            let arity = verb.arity();
            let args: Vec<String> = args.into_iter().take(arity.fixed()).collect();
            let tail = arity.tail.then_some(tail);

            let token = codec.encode(verb, &args, tail.as_deref()).unwrap();
            let decoded = codec.decode(&token).unwrap();
            prop_assert_eq!(decoded, RawToken { verb, args, tail });
        }

        /// Changing the filter keeps the keyword byte-for-byte.
        #[test]
        fn filter_switch_preserves_keyword(keyword in "\\PC{3,12}") {
            let codec = TokenCodec::new(4096);
            for filter in SearchFilter::ALL {
                let action = Action::SearchFilter { filter, keyword: keyword.clone() };
                let token = codec.encode_action(&action).unwrap();
                prop_assert_eq!(codec.decode_action(&token).unwrap(), action);
            }
        }
    }
}
