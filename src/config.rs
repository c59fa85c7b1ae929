/// Progress update interval (tick every N lines or pages)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Lines of the entity dump between two progress log lines
pub const ENTITY_LOG_INTERVAL: u64 = 500_000;

/// Articles between two progress log lines in the article passes
pub const ARTICLE_LOG_INTERVAL: u64 = 10_000;

/// Bump when the on-disk layout of `index.cache` changes
pub const CACHE_VERSION: u32 = 1;

/// Buffer size for table writers
pub const WRITER_BUFFER_SIZE: usize = 128 * 1024;

/// Buffer size for dump readers
pub const READER_BUFFER_SIZE: usize = 1024 * 1024;

/// Gold contexts are extended with following segments until they hold this many words
pub const CONTEXT_MIN_WORDS: usize = 64;

/// Field delimiter shared by all CSV tables
pub const TABLE_DELIMITER: u8 = b'|';

pub const ENTITY_DEFS_FILE: &str = "entity_defs.csv";
pub const ENTITY_ALIAS_FILE: &str = "entity_alias.csv";
pub const ENTITY_DESCR_FILE: &str = "entity_descriptions.csv";
pub const ENTITY_PROPERTIES_FILE: &str = "entity_properties.csv";
pub const PRIOR_PROB_FILE: &str = "prior_prob.csv";
pub const ENTITY_FREQ_FILE: &str = "entity_freq.csv";
pub const INDEX_CACHE_FILE: &str = "index.cache";

pub const DEFAULT_LANGUAGES: &[&str] = &[
    "ja", "de", "es", "ar", "sr", "tr", "fa", "ta", "en", "fr", "it",
];

/// "instance of"
pub const PROP_INSTANCE_OF: &str = "P31";
/// "subclass of"
pub const PROP_SUBCLASS_OF: &str = "P279";

/// Items whose instances or subclasses are never real-world entities:
/// Wikimedia meta pages, punctuation, letters and list/category classes.
pub const EXCLUDED_ITEMS: &[&str] = &[
    // Wikimedia meta items
    "Q163875",
    "Q191780",
    "Q224414",
    "Q4167836",
    "Q4167410",
    "Q4663903",
    "Q11266439",
    "Q13406463",
    "Q15407973",
    "Q18616576",
    "Q19887878",
    "Q22808320",
    "Q23894233",
    "Q33120876",
    "Q42104522",
    "Q47460393",
    "Q64875536",
    "Q66480449",
    // punctuation
    "Q1383557",
    "Q10617810",
    // letters
    "Q188725",
    "Q19776628",
    "Q3841820",
    "Q17907810",
    "Q9788",
    "Q9398093",
    // list, category and template classes
    "Q24046192",
    "Q20010800",
    "Q11753321",
    "Q19842659",
    "Q21528878",
    "Q17362920",
    "Q14204246",
    "Q21025364",
    "Q17442446",
    "Q26267864",
    "Q15184295",
];

/// Link prefixes pointing at non-article pages.
pub const META_NAMESPACES: &[&str] = &[
    "b",
    "betawikiversity",
    "Book",
    "c",
    "Category",
    "Commons",
    "d",
    "dbdump",
    "download",
    "Draft",
    "Education",
    "Foundation",
    "Gadget",
    "Gadget definition",
    "gerrit",
    "File",
    "Help",
    "Image",
    "Incubator",
    "m",
    "mail",
    "mailarchive",
    "media",
    "MediaWiki",
    "MediaWiki talk",
    "Mediawikiwiki",
    "MediaZilla",
    "Meta",
    "Metawikipedia",
    "Module",
    "mw",
    "n",
    "nost",
    "oldwikisource",
    "otrs",
    "OTRSwiki",
    "Portal",
    "phab",
    "Phabricator",
    "Project",
    "q",
    "quality",
    "rev",
    "s",
    "spcom",
    "Special",
    "species",
    "Strategy",
    "sulutil",
    "svn",
    "Talk",
    "Template",
    "Template talk",
    "Testwiki",
    "ticket",
    "TimedText",
    "Toollabs",
    "tools",
    "tswiki",
    "User",
    "User talk",
    "v",
    "voy",
    "w",
    "Wikibooks",
    "Wikidata",
    "wikiHow",
    "Wikinvest",
    "wikilivres",
    "Wikimedia",
    "Wikinews",
    "Wikipedia",
    "Wikipedia talk",
    "Wikiquote",
    "Wikisource",
    "Wikispecies",
    "Wikitech",
    "Wikiversity",
    "Wikivoyage",
    "wikt",
    "wiktionary",
    "wmf",
    "wmania",
    "WP",
];

/// Localized names of the file namespace.
pub const FILE_NAMESPACES: &[&str] = &["Bestand", "Datei", "File", "Fichier", "Image", "Media"];

/// Localized names of the category namespace.
pub const CATEGORY_NAMESPACES: &[&str] = &["Category", "Catégorie", "Categoría", "Kategorie"];

/// Elements removed together with their content.
pub const DISCARD_ELEMENTS: &[&str] = &[
    "gallery",
    "timeline",
    "noinclude",
    "pre",
    "table",
    "tr",
    "td",
    "th",
    "caption",
    "div",
    "form",
    "input",
    "select",
    "option",
    "textarea",
    "ul",
    "li",
    "ol",
    "dl",
    "dt",
    "dd",
    "menu",
    "dir",
    "ref",
    "references",
    "img",
    "imagemap",
    "source",
    "small",
    "sub",
    "sup",
    "indicator",
];

/// Tags dropped while their content is kept.
pub const IGNORED_TAGS: &[&str] = &[
    "abbr",
    "b",
    "big",
    "blockquote",
    "center",
    "cite",
    "em",
    "font",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hiero",
    "i",
    "kbd",
    "nowiki",
    "p",
    "plaintext",
    "s",
    "span",
    "strike",
    "strong",
    "tt",
    "u",
    "var",
];

pub const SELF_CLOSING_TAGS: &[&str] = &["br", "hr", "nobr", "ref", "references", "nowiki"];

/// Tags replaced by numbered placeholder tokens, as (tag, token).
pub const PLACEHOLDER_TAGS: &[(&str, &str)] = &[("math", "formula"), ("code", "codice")];

pub const MAGIC_WORDS: &[&str] = &[
    "__NOTOC__",
    "__FORCETOC__",
    "__TOC__",
    "__NEWSECTIONLINK__",
    "__NONEWSECTIONLINK__",
    "__NOGALLERY__",
    "__HIDDENCAT__",
    "__EXPECTUNUSEDCATEGORY__",
    "__NOCONTENTCONVERT__",
    "__NOCC__",
    "__NOTITLECONVERT__",
    "__NOTC__",
    "__START__",
    "__END__",
    "__INDEX__",
    "__NOINDEX__",
    "__STATICREDIRECT__",
    "__NOGLOBAL__",
    "__DISAMBIG__",
    "__NOEDITSECTION__",
];

/// URL schemes recognised in bracketed external links.
pub const URL_PROTOCOLS: &[&str] = &[
    "bitcoin:",
    "ftp://",
    "ftps://",
    "geo:",
    "git://",
    "gopher://",
    "http://",
    "https://",
    "irc://",
    "ircs://",
    "magnet:",
    "mailto:",
    "mms://",
    "news:",
    "nntp://",
    "redis://",
    "sftp://",
    "sip:",
    "sips:",
    "sms:",
    "ssh://",
    "svn://",
    "tel:",
    "telnet://",
    "urn:",
    "worldwind://",
    "xmpp:",
    "//",
];
