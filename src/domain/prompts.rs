//! Prompt text for each content profile.
//!
//! These are plain data: the pipeline treats them as opaque message bundles.

pub(crate) const LO_FI_STRUCTURE_SYSTEM: &str = "\
You write structures for lo-fi chill hip hop instrumentals. Keep the output under 2800 characters.
Build it from these resources:
1. Meta tags for style and genre such as [Lo-fi], [Chill], [Jazz-hop], [Ambient], [Downtempo], [Soulful], plus tags for dynamics and mood.
2. Section annotations such as [Drum Beat], [Bass Line], [Synth Melody], [Verse], [Chorus], [Break], [Instrumental Interlude], [Breakdown].
3. Formatting with brackets and capitals for emphasis, e.g. [Flute solo intro], [Crescendo], [Starts out quietly]. Separate sections with characters that cannot be sung, e.g. ┳┻┳┻┳┻.
4. Chord tags such as [Am], [F], [G], [Em], chosen to fit the mood.
5. A natural ending with [outro], [fade out] or [end].
6. Sound effects in uppercase brackets, e.g. [BIRDS CHIRPING FX], [RAIN FX].
7. A summary inside <INSTRUMENTAL_DETAILS></INSTRUMENTAL_DETAILS> listing GENRES, STYLE, MOOD, ARRANGEMENT, INSTRUMENTATION, TEMPO (70-90 BPM), PRODUCTION, DYNAMICS and EMOTIONS.
8. Onomatopoeia for instrumental passages, e.g. [Percussion Break] . .! .. .!";

pub(crate) const LO_FI_STRUCTURE_USER: &str =
    "Generate a lo-fi chill hip hop instrumental structure. Reply with the structure only.";

pub(crate) const LO_FI_TITLE_SYSTEM: &str = "You name lo-fi instrumental songs. The title should evoke chill, ambient, relaxed moods. Reply with the title only.";

pub(crate) const LO_FI_TITLE_USER: &str = "Generate a title for a lo-fi instrumental song.";

pub(crate) const LO_FI_TAGS_SYSTEM: &str = "\
You write style tags for lo-fi instrumental songs. Use ALL CAPS for genres, Title Case for descriptors and lower case for instruments.
Cover mood, sub-genre and instruments, separated by commas, for example: Calm LO-FI, gentle piano, smooth beats.
Reply with the tags only.";

pub(crate) const LO_FI_TAGS_USER: &str = "Generate tags for a lo-fi instrumental song.";

pub(crate) const LO_FI_COVER_SYSTEM: &str = "You write image prompts for anime-style chill lo-fi artwork: calm, atmospheric, pleasant scenes. Reply with the prompt only.";

pub(crate) const LO_FI_COVER_USER: &str = "Generate an image prompt for an anime chill lo-fi illustration.";

pub(crate) const LO_FI_DESCRIPTION: &str = "Relax and unwind with this lo-fi chill hip hop instrumental. Perfect for studying, relaxing, and chilling out.";

pub(crate) const LO_FI_VIDEO_TAGS: &[&str] = &[
    "lo-fi",
    "chill",
    "hip hop",
    "instrumental",
    "relaxing",
    "study music",
    "ambient",
    "atmospheric",
    "chillhop",
    "downtempo",
];

pub(crate) const TYPE_BEAT_STRUCTURE_SYSTEM: &str = "\
You write structures for hip hop instrumentals that blend two named styles. Keep the output under 2800 characters.
Use style tags such as [Boom Bap], [Trap], [Jazz-hop], [Sample based], [Funky], section annotations such as [Drum Beat], [Bass Line], [Hook], [Breakdown],
chord tags such as [Am], [F], [G], uppercase sound effects such as [VINYL SCRATCH FX], and a natural ending with [outro] or [fade out].
Summarise the piece inside <INSTRUMENTAL_DETAILS></INSTRUMENTAL_DETAILS> with GENRES, STYLE, MOOD, ARRANGEMENT, INSTRUMENTATION, TEMPO (85-95 BPM), PRODUCTION, DYNAMICS and EMOTIONS.";

pub(crate) const TYPE_BEAT_TITLE_SYSTEM: &str = "You name hip hop instrumentals so the title reflects the requested styles. Reply with the title only.";

pub(crate) const TYPE_BEAT_TAGS_SYSTEM: &str = "\
You write style tags for hip hop instrumentals. Use ALL CAPS for genres, Title Case for descriptors and lower case for instruments.
Separate tags with commas, for example: Energetic BOOM BAP, punchy drums, jazzy samples. Reply with the tags only.";

pub(crate) const TYPE_BEAT_COVER_SYSTEM: &str = "You write image prompts for anime-style artwork with a gritty, nostalgic hip hop street mood. Never name real artists. Reply with the prompt only.";

pub(crate) const TYPE_BEAT_VIDEO_TAGS: &[&str] = &["hip hop", "boom bap", "type beat", "free beats"];

pub(crate) const BOOM_BAP_STRUCTURE_SYSTEM: &str = "\
You write structures for classic 90s boom bap instrumentals. Keep the output under 2800 characters.
Use tags such as [Boom Bap], [Sample based], [Dusty Drums], [Vinyl Crackle FX], [Horn Stab], [Bass Line], [Hook], chord tags, and an ending with [outro].
Summarise the piece inside <INSTRUMENTAL_DETAILS></INSTRUMENTAL_DETAILS> with GENRES, MOOD, INSTRUMENTATION and TEMPO (88-96 BPM).";

pub(crate) const BOOM_BAP_STRUCTURE_USER: &str =
    "Generate a boom bap instrumental structure. Reply with the structure only.";

pub(crate) const BOOM_BAP_TITLE_SYSTEM: &str =
    "You name boom bap instrumentals with a raw, nostalgic feel. Reply with the title only.";

pub(crate) const BOOM_BAP_TITLE_USER: &str = "Generate a title for a boom bap instrumental.";

pub(crate) const BOOM_BAP_TAGS_USER: &str = "Generate tags for a boom bap instrumental.";

pub(crate) const BOOM_BAP_DESCRIPTION: &str =
    "Dusty drums and chopped samples: a boom bap instrumental in the classic 90s tradition.";

pub(crate) const BOOM_BAP_VIDEO_TAGS: &[&str] =
    &["boom bap", "hip hop", "instrumental", "90s hip hop", "sample based"];

pub(crate) const BOOM_BAP_COVER_FILE: &str = "boom-bap.png";

/// Producers and genres the type-beat profile blends, two at a time.
pub const STYLE_CATALOG: &[&str] = &[
    "J Dilla",
    "Madlib",
    "Dr. Dre",
    "MF DOOM",
    "Kanye West",
    "DJ Premier",
    "Pete Rock",
    "RZA",
    "Timbaland",
    "Metro Boomin",
    "Alchemist",
    "Pharrell Williams",
    "Jazz-hop",
    "Trap",
    "Funky",
    "Eminem",
    "Nujabes",
    "Boom Bap",
    "Lo-fi",
];
