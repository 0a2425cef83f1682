//! Image interrogation: a BLIP caption followed by CLIP-ranked tags.

mod artists;
mod beam;
mod caption;
mod category;
mod clip;
mod interrogator;
mod loader;
mod model;
mod preprocess;
mod rank;

pub use artists::{Artist, load_artists};
pub use beam::BeamSearch;
pub use caption::OnnxCaptioner;
pub use category::{Category, load_categories, parse_topn, read_category};
pub use clip::{OnnxRanker, fit_context};
pub use interrogator::{InterrogateSettings, Interrogator};
pub use loader::{OnnxLoader, load_tokenizer};
pub use model::{CaptionModel, CaptionParams, ModelLoader, RankingModel};
pub use preprocess::{blip_input, clip_input};
pub use rank::{l2_normalize_rows, similarity, top_labels};
