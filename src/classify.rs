//! Keyword categorisation and title cleanup.
//!
//! A [`Taxonomy`] is an ordered table of labels, each owning a list of
//! lowercase keywords. The first label with any keyword occurring in the text
//! wins, so table order decides overlaps such as a title mentioning both a
//! startup and an app.

use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_CATEGORY: &str = "General";

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").expect("valid regex"));

#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct Taxonomy {
    categories: &'static [Category],
}

const CATALOG_CATEGORIES: &[Category] = &[
    Category {
        label: "Tech",
        keywords: &[
            "tech", "programming", "coding", "software", "computer", "ai", "app", "developer",
            "ቴክኖሎጂ", "ፕሮግራሚንግ",
        ],
    },
    Category {
        label: "Business",
        keywords: &[
            "business", "entrepreneur", "money", "investment", "startup", "company", "ቢዝነስ",
            "ንግድ",
        ],
    },
    Category {
        label: "Lifestyle",
        keywords: &[
            "lifestyle", "life", "relationship", "family", "health", "ሕይወት", "የቤት እናት",
        ],
    },
    Category {
        label: "Success",
        keywords: &[
            "success", "motivation", "inspiration", "success story", "ስኬት", "ተስፋ",
        ],
    },
    Category {
        label: "Education",
        keywords: &["education", "learning", "teach", "school", "university", "ትምህርት"],
    },
    Category {
        label: "News",
        keywords: &["news", "ዜና", "current", "today"],
    },
];

const ARCHIVE_CATEGORIES: &[Category] = &[
    Category {
        label: "Tech",
        keywords: &[
            "ai", "tech", "innovator", "software", "programming", "digital", "ኢንተርኔት", "coding",
            "developer", "startup", "computer", "data", "ቴከኖሎጂ", "አርቲፊሻል", "amazon", "google",
            "microsoft", "cyber", "automation", "ሮቦት", "መተግበሪያ", "ዌብሳይት", "ድረ ገጽ", "ሲስተም",
            "ሃኪንግ", "ስልክ", "ላፕቶፕ",
        ],
    },
    Category {
        label: "Business",
        keywords: &[
            "business", "ቢዝነስ", "ንግድ", "money", "ገንዘብ", "bank", "ባንክ", "market", "መርካቶ",
            "investment", "ኢንቨስትመንት", "profit", "ትርፍ", "entrepreneur", "ድርጅት", "ስራ ፈጣሪ",
            "economy", "ሪል ስቴት", "real estate", "ሸቀጥ", "trade", "ሚሊየነር", "ሀብት", "ካፒታል",
            "ሽያጭ", "ገበያ", "ቢሊየነር", "ኢኮኖሚ", "ንግድ ስራ",
        ],
    },
    Category {
        label: "Success",
        keywords: &[
            "ህይወቱን ለመቀየር", "ስኬት", "success", "wisdom", "ልምድ", "ትምህርት", "motivation",
            "ተነሳሽነት", "habit", "discipline", "ግቡ", "ህልም", "dreams", "hustle", "ጥንካሬ",
            "inspiration", "ምክር", "ትጋት", "leadership", "አመራር", "ለውጥ", "ውሳኔ", "ስብዕና",
            "ስነ-ልቦና", "ማሳካት", "ጥበብ", "ትግል", "መክፈል", "መስዋትነት",
        ],
    },
    Category {
        label: "Entertainment",
        keywords: &[
            "funny", "ቀልድ", "comedy", "ጨዋታ", "donkey", "ወቸው", "entertainment", "music", "ሙዚቃ",
            "artist", "ፊልም", "drama", "ድራማ", "habesha", "vlog", "የመሳቅ", "ትውውቅ", "celebrity",
            "ተዋናይ", "ዝግጅት", "ጥያቄ", "መልስ", "ኮሜዲ", "ተሰጥኦ", "ድምጻዊ",
        ],
    },
    Category {
        label: "Lifestyle",
        keywords: &[
            "ሰርግ", "wedding", "marriage", "ቤተሰብ", "lifestyle", "ባለቤቴ", "ፍቅር", "family",
            "relationship", "ጤና", "health", "food", "ምግብ", "travel", "ጉዞ", "ልጆች", "fashion",
            "ፋሽን", "ውበት", "ትዳር", "ፍቅረኛ", "ባህል", "ልብስ", "ታሪክ", "ወግ", "የቤት", "ጤንነት",
        ],
    },
];

impl Taxonomy {
    /// Table used for the local JSON catalog.
    pub const fn catalog() -> Self {
        Self {
            categories: CATALOG_CATEGORIES,
        }
    }

    /// Table used for the Telegram archive.
    pub const fn archive() -> Self {
        Self {
            categories: ARCHIVE_CATEGORIES,
        }
    }

    /// Every label this taxonomy can return, including the default.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.categories
            .iter()
            .map(|category| category.label)
            .chain(std::iter::once(DEFAULT_CATEGORY))
    }

    pub fn classify(&self, title: &str, description: Option<&str>) -> &'static str {
        let text = format!("{} {}", title, description.unwrap_or_default()).to_lowercase();
        self.categories
            .iter()
            .find(|category| category.keywords.iter().any(|keyword| text.contains(keyword)))
            .map(|category| category.label)
            .unwrap_or(DEFAULT_CATEGORY)
    }
}

/// Drops `#tag` tokens and trims what is left.
pub fn clean_title(text: &str) -> String {
    HASHTAG.replace_all(text, "").trim().to_string()
}
