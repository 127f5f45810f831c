//! Template schema catalog
//!
//! Enumerates the dotted field paths a naming or notification template may
//! reference, plus the authoring snippets for control constructs. The
//! verifier checks references against these sets and the schema endpoint
//! serves them to authoring tools.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Context a template is rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// Folder/file naming after a release was parsed and matched
    Parser,
    /// Messages sent after a file was organized
    Notification,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Parser => "parser",
            SchemaType::Notification => "notification",
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SchemaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "parser" => Ok(SchemaType::Parser),
            "notification" => Ok(SchemaType::Notification),
            _ => Err(anyhow::anyhow!("Unknown template data type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
    List,
    Time,
}

/// One valid field path of a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub path: String,
    pub field_type: FieldType,
    pub description: &'static str,
    pub example: &'static str,
    pub category: &'static str,
}

/// The field set of one context type
#[derive(Debug)]
pub struct TemplateSchema {
    pub schema_type: SchemaType,
    fields: Vec<FieldDescriptor>,
    known: BTreeSet<String>,
}

impl TemplateSchema {
    fn new(schema_type: SchemaType, fields: Vec<FieldDescriptor>) -> Self {
        let known = fields.iter().map(|f| f.path.clone()).collect();
        Self {
            schema_type,
            fields,
            known,
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Exact, case-sensitive membership
    pub fn contains(&self, path: &str) -> bool {
        self.known.contains(path)
    }

    /// Known paths in ascending order
    pub fn known_paths(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }
}

type FieldSpec = (&'static str, FieldType, &'static str, &'static str);

const DBMOVIE_FIELDS: &[FieldSpec] = &[
    ("Title", FieldType::String, "Movie title from the metadata database", "The Matrix"),
    ("Year", FieldType::Int, "Release year", "1999"),
    ("ImdbID", FieldType::String, "IMDb id", "tt0133093"),
    ("OriginalTitle", FieldType::String, "Title in the original language", "The Matrix"),
    ("Runtime", FieldType::Int, "Runtime in minutes", "136"),
    ("Slug", FieldType::String, "URL-safe title", "the-matrix"),
];

const DBSERIE_FIELDS: &[FieldSpec] = &[
    ("Seriename", FieldType::String, "Series name from the metadata database", "Breaking Bad"),
    ("Year", FieldType::Int, "Year the series first aired", "2008"),
    ("Firstaired", FieldType::String, "First air date of the series", "2008-01-20"),
    ("ThetvdbID", FieldType::Int, "TheTVDB id", "81189"),
    ("ImdbID", FieldType::String, "IMDb id", "tt0903747"),
    ("Network", FieldType::String, "Original network", "AMC"),
    ("Slug", FieldType::String, "URL-safe series name", "breaking-bad"),
];

const DBSERIE_EPISODE_FIELDS: &[FieldSpec] = &[
    ("Title", FieldType::String, "Episode title", "Pilot"),
    ("Season", FieldType::Int, "Season number", "1"),
    ("Episode", FieldType::Int, "Episode number", "1"),
    ("Identifier", FieldType::String, "Episode identifier", "S01E01"),
    ("FirstAired", FieldType::String, "Air date of the episode", "2008-01-20"),
    ("Runtime", FieldType::Int, "Runtime in minutes", "58"),
];

const SOURCE_FIELDS: &[FieldSpec] = &[
    ("Title", FieldType::String, "Title parsed from the release name", "Breaking Bad"),
    ("Year", FieldType::Int, "Year parsed from the release name", "2008"),
    ("Season", FieldType::Int, "Parsed season", "1"),
    ("Episode", FieldType::Int, "Primary parsed episode", "1"),
    ("Episodes", FieldType::List, "All parsed episodes", "[1 2]"),
    ("Identifier", FieldType::String, "Derived identifier", "S01E01"),
    ("Date", FieldType::String, "Parsed air date of daily releases", "2026-01-07"),
    ("Resolution", FieldType::String, "Matched resolution group", "1080p"),
    ("Quality", FieldType::String, "Matched source quality group", "BluRay"),
    ("Codec", FieldType::String, "Matched codec group", "x264"),
    ("Audio", FieldType::String, "Matched or parsed audio", "DTS-HD.MA"),
    ("Languages", FieldType::List, "Detected languages", "[english]"),
    ("Proper", FieldType::Bool, "Release is a PROPER", "false"),
    ("Extended", FieldType::Bool, "Release is an extended cut", "false"),
    ("Repack", FieldType::Bool, "Release is a REPACK", "false"),
    ("Imdb", FieldType::String, "IMDb id found in the name", "tt0903747"),
    ("Tvdb", FieldType::String, "TheTVDB id found in the name", "81189"),
    ("Runtime", FieldType::Int, "File runtime in minutes", "58"),
    ("Width", FieldType::Int, "Video width", "1920"),
    ("Height", FieldType::Int, "Video height", "1080"),
    ("Size", FieldType::Int, "File size in bytes", "1073741824"),
];

const PARSER_TOP_FIELDS: &[FieldSpec] = &[
    ("TitleSource", FieldType::String, "Movie title or series name chosen for naming", "Breaking Bad"),
    ("EpisodeTitleSource", FieldType::String, "Episode title chosen for naming", "Pilot"),
    ("Identifier", FieldType::String, "Identifier used for naming", "S01E01"),
    ("Episodes", FieldType::List, "Episode numbers of the file", "[1]"),
    ("Priority", FieldType::Int, "Composite quality score", "9"),
];

const NOTIFICATION_TOP_FIELDS: &[FieldSpec] = &[
    ("Time", FieldType::Time, "Time the notification was created", "2026-01-07 20:15:00"),
    ("Title", FieldType::String, "Movie title or series name", "Breaking Bad"),
    ("Year", FieldType::Int, "Release year", "2008"),
    ("Season", FieldType::Int, "Season number", "1"),
    ("Episode", FieldType::Int, "Episode number", "1"),
    ("Identifier", FieldType::String, "Identifier of the item", "S01E01"),
    ("Quality", FieldType::String, "Quality profile used", "HD"),
    ("SourcePath", FieldType::String, "Path the file came from", "/downloads/Breaking.Bad.S01E01.mkv"),
    ("Targetpath", FieldType::String, "Path the file was organized to", "/tv/Breaking Bad/Season 1"),
    ("Configuration", FieldType::String, "Media configuration name", "series-en"),
    ("Replaced", FieldType::List, "Files replaced by the new file", "[/tv/old.mkv]"),
];

fn push_fields(out: &mut Vec<FieldDescriptor>, prefix: &str, category: &'static str, specs: &[FieldSpec]) {
    for (name, field_type, description, example) in specs {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        };
        out.push(FieldDescriptor {
            path,
            field_type: *field_type,
            description,
            example,
            category,
        });
    }
}

fn metadata_fields(out: &mut Vec<FieldDescriptor>) {
    push_fields(out, "Dbmovie", "movie", DBMOVIE_FIELDS);
    push_fields(out, "Dbserie", "series", DBSERIE_FIELDS);
    push_fields(out, "DbserieEpisode", "episode", DBSERIE_EPISODE_FIELDS);
    push_fields(out, "Source", "source", SOURCE_FIELDS);
}

static PARSER_SCHEMA: Lazy<TemplateSchema> = Lazy::new(|| {
    let mut fields = Vec::new();
    metadata_fields(&mut fields);
    push_fields(&mut fields, "", "general", PARSER_TOP_FIELDS);
    TemplateSchema::new(SchemaType::Parser, fields)
});

static NOTIFICATION_SCHEMA: Lazy<TemplateSchema> = Lazy::new(|| {
    let mut fields = Vec::new();
    push_fields(&mut fields, "", "general", NOTIFICATION_TOP_FIELDS);
    metadata_fields(&mut fields);
    TemplateSchema::new(SchemaType::Notification, fields)
});

/// The field catalog for a context type
pub fn schema(schema_type: SchemaType) -> &'static TemplateSchema {
    match schema_type {
        SchemaType::Parser => &PARSER_SCHEMA,
        SchemaType::Notification => &NOTIFICATION_SCHEMA,
    }
}

/// A reusable control-construct snippet for template authors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSnippet {
    pub name: &'static str,
    pub description: &'static str,
    pub template: &'static str,
}

const STRUCTURE_CATALOG: &[TemplateSnippet] = &[
    TemplateSnippet {
        name: "If",
        description: "Render a block only when a field is non-empty",
        template: "{{if .Source.Resolution}} [{{.Source.Resolution}}]{{end}}",
    },
    TemplateSnippet {
        name: "If-Else",
        description: "Choose between two blocks",
        template: "{{if .Dbmovie.Year}}({{.Dbmovie.Year}}){{else}}(unknown){{end}}",
    },
    TemplateSnippet {
        name: "Range",
        description: "Repeat a block for every element of a list",
        template: "{{range .Source.Languages}}{{.}} {{end}}",
    },
    TemplateSnippet {
        name: "Range-with-index",
        description: "Repeat a block with the element index available",
        template: "{{range $i, $e := .Episodes}}{{if $i}}-{{end}}E{{printf \"%02d\" $e}}{{end}}",
    },
    TemplateSnippet {
        name: "With",
        description: "Narrow the context to a nested value when it is non-empty",
        template: "{{with .Dbserie}}{{.Seriename}}{{end}}",
    },
    TemplateSnippet {
        name: "Variable-assignment",
        description: "Store a value in a variable for later use",
        template: "{{$title := .TitleSource}}{{$title}}",
    },
];

/// Authoring snippets for the control constructs the renderer understands
pub fn structure_catalog() -> &'static [TemplateSnippet] {
    STRUCTURE_CATALOG
}
