//! Content fingerprinting for duplicate detection
//!
//! Two independent keys are derived from a title/description pair:
//! - Concept hash: literal-text digest, insensitive to case, punctuation,
//!   whitespace and word order
//! - Intent signature: coarse keyword signature that groups paraphrases
//!   proposing the same underlying action

use super::models::{CandidateItem, ContentKind};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Hex characters kept from the SHA-256 digest
const CONCEPT_HASH_LEN: usize = 16;

/// Default number of intent tokens in a signature
pub const DEFAULT_MAX_INTENT_TOKENS: usize = 4;

/// Below this many intent tokens from the title, the description is consulted
const MIN_TITLE_INTENT_TOKENS: usize = 2;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "a", "an", "the", "of", "to", "and", "or", "for", "in", "on", "at", "by", "with",
        "your", "our", "their", "my", "from", "into", "is", "are", "be", "this", "that", "it",
        "its", "as", "via", "per", "all", "any", "some", "more", "most", "new", "better",
        // Spanish
        "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "al", "y", "e",
        "o", "u", "para", "por", "en", "con", "sin", "su", "sus", "tu", "tus", "mi", "mis",
        "que", "se", "lo", "es", "son", "mas", "muy", "nuevo", "nueva", "nuevos", "nuevas",
        "mejor", "todo", "todos",
    ]
    .into_iter()
    .collect()
});

/// Modifiers that change wording but not the proposed action
static FILLER_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "average", "avg", "size", "level", "overall", "general", "total", "amount", "rate",
        "promedio", "medio", "media", "tamano", "nivel", "monto", "cantidad", "tasa",
    ]
    .into_iter()
    .collect()
});

static INTENT_SYNONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let groups: &[(&str, &[&str])] = &[
        (
            "increase",
            &[
                "increase", "raise", "boost", "grow", "lift", "maximize", "subir", "aumentar",
                "incrementar", "elevar", "crecer", "potenciar", "maximizar",
            ],
        ),
        (
            "decrease",
            &[
                "decrease", "reduce", "cut", "lower", "minimize", "trim", "reducir", "bajar",
                "disminuir", "recortar", "minimizar",
            ],
        ),
        (
            "improve",
            &["improve", "enhance", "optimize", "optimise", "mejorar", "optimizar", "perfeccionar"],
        ),
        (
            "launch",
            &["launch", "create", "start", "open", "introduce", "lanzar", "crear", "iniciar", "abrir"],
        ),
        ("ticket", &["ticket", "check", "basket", "aov", "cesta", "canasta"]),
        ("price", &["price", "pricing", "precio", "tarifa"]),
        ("cost", &["cost", "expense", "costo", "coste", "gasto", "egreso"]),
        ("sales", &["sales", "sale", "revenue", "income", "venta", "ingreso", "facturacion"]),
        ("customer", &["customer", "client", "buyer", "cliente", "comprador"]),
        ("service", &["service", "attention", "support", "servicio", "atencion", "soporte"]),
        (
            "phone",
            &["phone", "telephone", "call", "telefono", "telefonica", "telefonico", "llamada"],
        ),
        (
            "marketing",
            &["marketing", "advertising", "ads", "campaign", "publicidad", "promocion", "campana"],
        ),
        ("social", &["social", "instagram", "facebook", "tiktok", "redes"]),
        ("inventory", &["inventory", "stock", "inventario", "existencia"]),
        ("staff", &["staff", "team", "employee", "personal", "equipo", "empleado"]),
        (
            "retention",
            &["retention", "loyalty", "retain", "fidelizar", "fidelizacion", "retencion"],
        ),
    ];

    groups
        .iter()
        .flat_map(|(canonical, words)| words.iter().map(move |w| (*w, *canonical)))
        .collect()
});

/// Fold common Latin diacritics onto their base letter
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Lowercase, fold diacritics, turn punctuation into separators and split
pub fn normalize_tokens(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Strip a plural suffix from longer words
fn stem(token: &str) -> &str {
    if token.len() > 4 && token.ends_with('s') && !token.ends_with("ss") {
        &token[..token.len() - 1]
    } else {
        token
    }
}

/// Map a normalized token to its intent token, if it carries intent
fn intent_token(token: &str) -> Option<String> {
    if STOP_WORDS.contains(token) || FILLER_WORDS.contains(token) {
        return None;
    }

    if let Some(canonical) = INTENT_SYNONYMS.get(token) {
        return Some((*canonical).to_string());
    }

    let stemmed = stem(token);
    if FILLER_WORDS.contains(stemmed) {
        return None;
    }
    if let Some(canonical) = INTENT_SYNONYMS.get(stemmed) {
        return Some((*canonical).to_string());
    }

    // Short leftovers ("x", "2", "ok") carry no intent
    if stemmed.chars().count() < 3 {
        return None;
    }

    Some(stemmed.to_string())
}

/// Collect distinct intent tokens from `text` into `out`, up to `max`
fn collect_intent_tokens(text: &str, max: usize, out: &mut Vec<String>) {
    for token in normalize_tokens(text) {
        if out.len() >= max {
            break;
        }
        if let Some(intent) = intent_token(&token) {
            if !out.contains(&intent) {
                out.push(intent);
            }
        }
    }
}

/// Fingerprint generator with a configurable intent-token budget
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    max_intent_tokens: usize,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INTENT_TOKENS)
    }
}

impl Fingerprinter {
    pub fn new(max_intent_tokens: usize) -> Self {
        Self {
            max_intent_tokens: max_intent_tokens.max(1),
        }
    }

    /// Normalized, order-insensitive digest of the literal text
    pub fn concept_hash(&self, title: &str, description: &str) -> String {
        let mut tokens = normalize_tokens(title);
        tokens.extend(normalize_tokens(description));
        tokens.sort();
        tokens.dedup();

        let mut hasher = Sha256::new();
        hasher.update(tokens.join(" ").as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(CONCEPT_HASH_LEN);
        digest
    }

    /// Paraphrase-tolerant signature of the proposed action.
    ///
    /// Intent tokens come from the title; the description only contributes
    /// when the title alone yields fewer than two.
    pub fn intent_signature(
        &self,
        title: &str,
        description: &str,
        kind_hint: Option<ContentKind>,
    ) -> String {
        let mut tokens = Vec::new();
        collect_intent_tokens(title, self.max_intent_tokens, &mut tokens);
        if tokens.len() < MIN_TITLE_INTENT_TOKENS {
            collect_intent_tokens(description, self.max_intent_tokens, &mut tokens);
        }

        let body = if tokens.is_empty() {
            // Keyword-free items must not collide with each other
            format!("~{}", self.concept_hash(title, description))
        } else {
            tokens.sort();
            tokens.join("+")
        };

        match kind_hint {
            Some(kind) => format!("{}:{}", kind.as_str(), body),
            None => body,
        }
    }

    /// Both fingerprints for a candidate
    pub fn fingerprint(&self, item: &CandidateItem) -> Fingerprint {
        let description = item.description_text();
        Fingerprint {
            concept_hash: self.concept_hash(&item.title, description),
            intent_signature: self.intent_signature(&item.title, description, Some(item.kind)),
        }
    }
}

/// Comparison keys for one item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub concept_hash: String,
    pub intent_signature: String,
}

impl Fingerprint {
    pub fn of(item: &CandidateItem) -> Self {
        Fingerprinter::default().fingerprint(item)
    }
}

/// Concept hash with the default fingerprinter
pub fn generate_concept_hash(title: &str, description: &str) -> String {
    Fingerprinter::default().concept_hash(title, description)
}

/// Intent signature with the default fingerprinter
pub fn generate_intent_signature(
    title: &str,
    description: &str,
    kind_hint: Option<ContentKind>,
) -> String {
    Fingerprinter::default().intent_signature(title, description, kind_hint)
}
