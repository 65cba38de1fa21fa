//! Content profiles and the immutable variant configuration a pipeline
//! instance carries from compose through publish.
//!
//! A [`VariantSelection`] is chosen once, when the compose job is enqueued.
//! [`resolve`] is a pure mapping from that selection to a [`VariantConfig`],
//! and the resolved config is copied into every downstream job payload so no
//! later stage ever re-runs selection.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::prompts::*;

/// Content profile tag, as named by triggers and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    LoFi,
    TypeBeat,
    BoomBap,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::LoFi, Profile::TypeBeat, Profile::BoomBap];
    pub const DEFAULT: Profile = Profile::LoFi;

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::LoFi => "lo_fi",
            Profile::TypeBeat => "type_beat",
            Profile::BoomBap => "boom_bap",
        }
    }

    /// Parse a selector leniently. Unknown selectors map to [`Profile::DEFAULT`].
    pub fn from_selector(selector: &str) -> Profile {
        let normalized = selector.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "lo_fi" | "lofi" | "default" => Profile::LoFi,
            "type_beat" | "typebeat" => Profile::TypeBeat,
            "boom_bap" | "boombap" => Profile::BoomBap,
            _ => Profile::DEFAULT,
        }
    }

    pub fn requires_styles(self) -> bool {
        matches!(self, Profile::TypeBeat)
    }

    /// File name of the cover this profile reuses instead of generating one.
    pub fn static_cover(self) -> Option<&'static str> {
        match self {
            Profile::BoomBap => Some(BOOM_BAP_COVER_FILE),
            Profile::LoFi | Profile::TypeBeat => None,
        }
    }
}

/// Two distinct free-text style descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StylePair {
    first: String,
    second: String,
}

impl StylePair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Result<Self, DomainError> {
        let first = first.into().trim().to_string();
        let second = second.into().trim().to_string();
        if first.is_empty() || second.is_empty() {
            return Err(DomainError::validation("style descriptors must not be empty"));
        }
        if first == second {
            return Err(DomainError::validation(format!(
                "style descriptors must differ, got `{first}` twice"
            )));
        }
        Ok(Self { first, second })
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }
}

/// Draw two distinct entries uniformly at random, without replacement.
pub fn sample_style_pair<R: Rng + ?Sized>(
    catalog: &[&str],
    rng: &mut R,
) -> Result<StylePair, DomainError> {
    if catalog.len() < 2 {
        return Err(DomainError::invariant(format!(
            "style catalog needs at least two entries, has {}",
            catalog.len()
        )));
    }

    let picks = rand::seq::index::sample(rng, catalog.len(), 2);
    StylePair::new(catalog[picks.index(0)], catalog[picks.index(1)])
}

/// A profile together with the data it needs. Resolved by [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum VariantSelection {
    LoFi,
    TypeBeat { styles: StylePair },
    BoomBap,
}

impl VariantSelection {
    pub fn profile(&self) -> Profile {
        match self {
            VariantSelection::LoFi => Profile::LoFi,
            VariantSelection::TypeBeat { .. } => Profile::TypeBeat,
            VariantSelection::BoomBap => Profile::BoomBap,
        }
    }

    /// Build a selection for `profile`, sampling a style pair from the
    /// catalog when the profile needs one and none was supplied.
    pub fn choose<R: Rng + ?Sized>(
        profile: Profile,
        styles: Option<StylePair>,
        rng: &mut R,
    ) -> Result<Self, DomainError> {
        Ok(match profile {
            Profile::LoFi => VariantSelection::LoFi,
            Profile::BoomBap => VariantSelection::BoomBap,
            Profile::TypeBeat => {
                let styles = match styles {
                    Some(styles) => styles,
                    None => sample_style_pair(STYLE_CATALOG, rng)?,
                };
                VariantSelection::TypeBeat { styles }
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Instructions for the three compose-stage generations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub structure: Vec<ChatMessage>,
    pub title: Vec<ChatMessage>,
    pub tags: Vec<ChatMessage>,
}

/// Where the render stage gets the still image for the video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverArt {
    /// Ask the text service for an image prompt, then generate the image.
    Generated { prompt: Vec<ChatMessage> },
    /// Reuse a file from the static cover directory.
    Static { file_name: String },
}

/// Turns a raw generated title into the published title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleTemplate(String);

impl TitleTemplate {
    pub const PLACEHOLDER: &'static str = "{title}";

    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn apply(&self, raw: &str) -> String {
        self.0.replace(Self::PLACEHOLDER, raw.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishMetadata {
    pub description: String,
    pub tags: Vec<String>,
    pub collection: Option<String>,
}

/// Everything a pipeline instance needs to know about its profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub selection: VariantSelection,
    pub prompts: PromptSet,
    pub cover: CoverArt,
    pub title: TitleTemplate,
    pub publish: PublishMetadata,
}

impl VariantConfig {
    /// Attach the destination collection published videos are added to.
    pub fn with_collection(mut self, collection: Option<String>) -> Self {
        self.publish.collection = collection;
        self
    }
}

fn owned_tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|tag| (*tag).to_string()).collect()
}

/// Map a selection to its configuration. Pure and deterministic.
pub fn resolve(selection: &VariantSelection) -> VariantConfig {
    match selection {
        VariantSelection::LoFi => VariantConfig {
            selection: selection.clone(),
            prompts: PromptSet {
                structure: vec![
                    ChatMessage::system(LO_FI_STRUCTURE_SYSTEM),
                    ChatMessage::user(LO_FI_STRUCTURE_USER),
                ],
                title: vec![
                    ChatMessage::system(LO_FI_TITLE_SYSTEM),
                    ChatMessage::user(LO_FI_TITLE_USER),
                ],
                tags: vec![
                    ChatMessage::system(LO_FI_TAGS_SYSTEM),
                    ChatMessage::user(LO_FI_TAGS_USER),
                ],
            },
            cover: CoverArt::Generated {
                prompt: vec![
                    ChatMessage::system(LO_FI_COVER_SYSTEM),
                    ChatMessage::user(LO_FI_COVER_USER),
                ],
            },
            title: TitleTemplate::new("lo-fi chill beat - {title}"),
            publish: PublishMetadata {
                description: LO_FI_DESCRIPTION.to_string(),
                tags: owned_tags(LO_FI_VIDEO_TAGS),
                collection: None,
            },
        },
        VariantSelection::TypeBeat { styles } => {
            let (a, b) = (styles.first(), styles.second());
            let blend = format!("inspired by two different styles: {a} and {b}");
            VariantConfig {
                selection: selection.clone(),
                prompts: PromptSet {
                    structure: vec![
                        ChatMessage::system(TYPE_BEAT_STRUCTURE_SYSTEM),
                        ChatMessage::user(format!(
                            "Generate a hip hop instrumental structure {blend}. Reply with the structure only."
                        )),
                    ],
                    title: vec![
                        ChatMessage::system(TYPE_BEAT_TITLE_SYSTEM),
                        ChatMessage::user(format!(
                            "Generate a title for a hip hop instrumental {blend}."
                        )),
                    ],
                    tags: vec![
                        ChatMessage::system(TYPE_BEAT_TAGS_SYSTEM),
                        ChatMessage::user(format!(
                            "Generate tags for a hip hop instrumental {blend}."
                        )),
                    ],
                },
                cover: CoverArt::Generated {
                    prompt: vec![
                        ChatMessage::system(TYPE_BEAT_COVER_SYSTEM),
                        ChatMessage::user(format!(
                            "Generate an image prompt for an anime illustration with a hip hop theme {blend}."
                        )),
                    ],
                },
                title: TitleTemplate::new(format!("[FREE] {a} x {b} type beat - {{title}}")),
                publish: PublishMetadata {
                    description: format!("{a} x {b} type beat. Free for use."),
                    tags: owned_tags(TYPE_BEAT_VIDEO_TAGS),
                    collection: None,
                },
            }
        }
        VariantSelection::BoomBap => VariantConfig {
            selection: selection.clone(),
            prompts: PromptSet {
                structure: vec![
                    ChatMessage::system(BOOM_BAP_STRUCTURE_SYSTEM),
                    ChatMessage::user(BOOM_BAP_STRUCTURE_USER),
                ],
                title: vec![
                    ChatMessage::system(BOOM_BAP_TITLE_SYSTEM),
                    ChatMessage::user(BOOM_BAP_TITLE_USER),
                ],
                tags: vec![
                    ChatMessage::system(TYPE_BEAT_TAGS_SYSTEM),
                    ChatMessage::user(BOOM_BAP_TAGS_USER),
                ],
            },
            cover: CoverArt::Static {
                file_name: BOOM_BAP_COVER_FILE.to_string(),
            },
            title: TitleTemplate::new("boom bap instrumental - {title}"),
            publish: PublishMetadata {
                description: BOOM_BAP_DESCRIPTION.to_string(),
                tags: owned_tags(BOOM_BAP_VIDEO_TAGS),
                collection: None,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn all_selections() -> Vec<VariantSelection> {
        vec![
            VariantSelection::LoFi,
            VariantSelection::TypeBeat {
                styles: StylePair::new("J Dilla", "Nujabes").expect("valid pair"),
            },
            VariantSelection::BoomBap,
        ]
    }

    #[test]
    fn every_profile_resolves_to_a_complete_config() {
        for selection in all_selections() {
            let config = resolve(&selection);
            assert_eq!(config.selection, selection);
            assert!(!config.prompts.structure.is_empty());
            assert!(!config.prompts.title.is_empty());
            assert!(!config.prompts.tags.is_empty());
            assert!(!config.publish.description.is_empty());
            assert!(!config.publish.tags.is_empty());
            assert!(
                config
                    .prompts
                    .structure
                    .iter()
                    .chain(&config.prompts.title)
                    .chain(&config.prompts.tags)
                    .all(|message| !message.content.trim().is_empty())
            );
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        for selection in all_selections() {
            assert_eq!(resolve(&selection), resolve(&selection));
        }
    }

    #[test]
    fn type_beat_threads_styles_into_title_and_description() {
        let styles = StylePair::new("Madlib", "RZA").expect("valid pair");
        let config = resolve(&VariantSelection::TypeBeat { styles });

        assert_eq!(
            config.title.apply("Dusty Corners"),
            "[FREE] Madlib x RZA type beat - Dusty Corners"
        );
        assert_eq!(config.publish.description, "Madlib x RZA type beat. Free for use.");
        assert!(config.prompts.title[1].content.contains("Madlib and RZA"));
    }

    #[test]
    fn lo_fi_title_rule_prefixes_raw_title() {
        let config = resolve(&VariantSelection::LoFi);
        assert_eq!(config.title.apply(" Rainy Window "), "lo-fi chill beat - Rainy Window");
        assert!(matches!(config.cover, CoverArt::Generated { .. }));
    }

    #[test]
    fn static_cover_names_match_resolved_cover_art() {
        for selection in all_selections() {
            let expected = match resolve(&selection).cover {
                CoverArt::Static { file_name } => Some(file_name),
                CoverArt::Generated { .. } => None,
            };
            assert_eq!(
                selection.profile().static_cover().map(str::to_string),
                expected
            );
        }
    }

    #[test]
    fn boom_bap_reuses_a_static_cover() {
        let config = resolve(&VariantSelection::BoomBap);
        assert_eq!(
            config.cover,
            CoverArt::Static {
                file_name: "boom-bap.png".to_string()
            }
        );
    }

    #[test]
    fn unknown_selectors_fall_back_to_default_profile() {
        assert_eq!(Profile::from_selector("default"), Profile::LoFi);
        assert_eq!(Profile::from_selector("Type-Beat"), Profile::TypeBeat);
        assert_eq!(Profile::from_selector("boom bap"), Profile::BoomBap);
        assert_eq!(Profile::from_selector("polka"), Profile::DEFAULT);
        assert_eq!(Profile::from_selector(""), Profile::DEFAULT);
    }

    #[test]
    fn sampler_never_returns_equal_entries() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let pair = sample_style_pair(STYLE_CATALOG, &mut rng).expect("catalog is large enough");
            assert_ne!(pair.first(), pair.second());
            assert!(STYLE_CATALOG.contains(&pair.first()));
            assert!(STYLE_CATALOG.contains(&pair.second()));
        }
    }

    #[test]
    fn sampler_covers_both_orders_of_a_two_entry_catalog() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen_forward = false;
        let mut seen_reverse = false;
        for _ in 0..200 {
            let pair = sample_style_pair(&["Trap", "Funky"], &mut rng).expect("two entries");
            match pair.first() {
                "Trap" => seen_forward = true,
                _ => seen_reverse = true,
            }
        }
        assert!(seen_forward && seen_reverse);
    }

    #[test]
    fn sampler_fails_fast_on_small_catalogs() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            sample_style_pair(&["Trap"], &mut rng),
            Err(DomainError::Invariant { .. })
        ));
        assert!(sample_style_pair(&[], &mut rng).is_err());
    }

    #[test]
    fn style_pairs_reject_duplicates() {
        assert!(StylePair::new("Trap", "Trap").is_err());
        assert!(StylePair::new(" ", "Trap").is_err());
    }

    #[test]
    fn choose_samples_styles_only_when_needed() {
        let mut rng = StdRng::seed_from_u64(3);
        let chosen = VariantSelection::choose(Profile::TypeBeat, None, &mut rng).expect("sampled");
        assert!(matches!(chosen, VariantSelection::TypeBeat { .. }));

        let supplied = StylePair::new("RZA", "Lo-fi").expect("valid pair");
        let chosen = VariantSelection::choose(Profile::TypeBeat, Some(supplied.clone()), &mut rng)
            .expect("supplied");
        assert_eq!(chosen, VariantSelection::TypeBeat { styles: supplied });

        let chosen = VariantSelection::choose(Profile::LoFi, None, &mut rng).expect("no styles");
        assert_eq!(chosen, VariantSelection::LoFi);
    }

    #[test]
    fn selection_survives_json_payloads_unchanged() {
        let config = resolve(&VariantSelection::TypeBeat {
            styles: StylePair::new("Pete Rock", "Timbaland").expect("valid pair"),
        })
        .with_collection(Some("PL123".to_string()));
        let json = serde_json::to_value(&config).expect("serialize");
        let back: VariantConfig = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, config);
    }
}
