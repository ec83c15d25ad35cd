use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    pub code: &'static str,
    pub name: &'static str,
    pub dial_prefix: &'static str,
    pub flag: &'static str,
    /// National number lengths accepted for this country, in digits
    pub valid_lengths: &'static [usize],
}

impl Country {
    pub fn max_length(&self) -> usize {
        self.valid_lengths.iter().copied().max().unwrap_or(0)
    }
}

macro_rules! country {
    ($code:literal, $name:literal, $dial:literal, $flag:literal, [$($len:literal),+]) => {
        Country {
            code: $code,
            name: $name,
            dial_prefix: $dial,
            flag: $flag,
            valid_lengths: &[$($len),+],
        }
    };
}

pub static COUNTRIES: &[Country] = &[
    country!("RU", "Russia", "+7", "🇷🇺", [10]),
    country!("US", "United States", "+1", "🇺🇸", [10]),
    country!("GB", "United Kingdom", "+44", "🇬🇧", [10]),
    country!("DE", "Germany", "+49", "🇩🇪", [10, 11]),
    country!("FR", "France", "+33", "🇫🇷", [9]),
    country!("IT", "Italy", "+39", "🇮🇹", [9, 10]),
    country!("ES", "Spain", "+34", "🇪🇸", [9]),
    country!("UA", "Ukraine", "+380", "🇺🇦", [9]),
    country!("BY", "Belarus", "+375", "🇧🇾", [9]),
    country!("KZ", "Kazakhstan", "+7", "🇰🇿", [10]),
    country!("CN", "China", "+86", "🇨🇳", [11]),
    country!("JP", "Japan", "+81", "🇯🇵", [10]),
    country!("KR", "South Korea", "+82", "🇰🇷", [10, 11]),
    country!("IN", "India", "+91", "🇮🇳", [10]),
    country!("BR", "Brazil", "+55", "🇧🇷", [10, 11]),
    country!("AR", "Argentina", "+54", "🇦🇷", [10]),
    country!("MX", "Mexico", "+52", "🇲🇽", [10]),
    country!("CA", "Canada", "+1", "🇨🇦", [10]),
    country!("AU", "Australia", "+61", "🇦🇺", [9]),
    country!("TR", "Turkey", "+90", "🇹🇷", [10]),
    country!("EG", "Egypt", "+20", "🇪🇬", [10]),
    country!("ZA", "South Africa", "+27", "🇿🇦", [9]),
    country!("AE", "United Arab Emirates", "+971", "🇦🇪", [9]),
    country!("SA", "Saudi Arabia", "+966", "🇸🇦", [9]),
    country!("IL", "Israel", "+972", "🇮🇱", [9]),
];

pub fn find(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Group spans applied before the remaining digits, keyed by country code
static GROUPINGS: &[(&str, &[usize])] = &[
    ("RU", &[3, 3, 2, 2]),
    ("KZ", &[3, 3, 2, 2]),
    ("US", &[3, 3, 4]),
    ("CA", &[3, 3, 4]),
    ("DE", &[3, 3]),
];

const DEFAULT_GROUPING: &[usize] = &[3, 3];

pub(crate) fn grouping(country: &Country) -> &'static [usize] {
    GROUPINGS
        .iter()
        .find(|(code, _)| *code == country.code)
        .map(|(_, spans)| *spans)
        .unwrap_or(DEFAULT_GROUPING)
}
