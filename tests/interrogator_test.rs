//! Interrogator behaviour with fake caption and ranking models.

use image::{DynamicImage, RgbImage};
use ndarray::{Array2, array};
use std::cell::RefCell;
use std::rc::Rc;
use vista::config::{MemoryMode, Precision};
use vista::error::{Error, Result};
use vista::interrogate::{
    Artist, CaptionModel, CaptionParams, Category, InterrogateSettings, Interrogator,
    ModelLoader, RankingModel,
};
use vista::runtime::{Placeable, Placement, ResidencyPolicy};

#[derive(Default)]
struct Log {
    loads: usize,
    host_moves: usize,
    texts_ranked: Vec<usize>,
}

struct FakeCaption {
    placement: Placement,
    fail: bool,
    log: Rc<RefCell<Log>>,
}

impl Placeable for FakeCaption {
    fn placement(&self) -> Placement {
        self.placement
    }

    fn move_to_device(&mut self) -> Result<()> {
        self.placement = Placement::Device;
        Ok(())
    }

    fn move_to_host(&mut self) {
        self.log.borrow_mut().host_moves += 1;
        self.placement = Placement::Host;
    }
}

impl CaptionModel for FakeCaption {
    fn caption(&mut self, _image: &DynamicImage, _params: CaptionParams) -> Result<String> {
        if self.fail {
            return Err(Error::inference("blip.decoder", "fake failure"));
        }
        Ok("a cat sitting on a mat".to_string())
    }
}

struct FakeRanker {
    placement: Placement,
    fail: bool,
    log: Rc<RefCell<Log>>,
}

impl Placeable for FakeRanker {
    fn placement(&self) -> Placement {
        self.placement
    }

    fn move_to_device(&mut self) -> Result<()> {
        self.placement = Placement::Device;
        Ok(())
    }

    fn move_to_host(&mut self) {
        self.log.borrow_mut().host_moves += 1;
        self.placement = Placement::Host;
    }
}

impl RankingModel for FakeRanker {
    fn precision(&self) -> Precision {
        Precision::Half
    }

    fn encode_image(&mut self, _image: &DynamicImage) -> Result<Array2<f32>> {
        if self.fail {
            return Err(Error::inference("clip.vision", "fake failure"));
        }
        Ok(array![[2.0, 0.0]])
    }

    /// Texts mentioning cats point along the image embedding.
    fn encode_text(&mut self, texts: &[String]) -> Result<Array2<f32>> {
        self.log.borrow_mut().texts_ranked.push(texts.len());
        let mut out = Array2::zeros((texts.len(), 2));
        for (i, text) in texts.iter().enumerate() {
            if text.to_lowercase().contains("cat") {
                out[[i, 0]] = 3.0;
            } else {
                out[[i, 1]] = 3.0;
            }
        }
        Ok(out)
    }
}

struct FakeLoader {
    fail_caption: bool,
    fail_ranker: bool,
    fail_load: bool,
    log: Rc<RefCell<Log>>,
}

impl FakeLoader {
    fn new(log: &Rc<RefCell<Log>>) -> Self {
        Self {
            fail_caption: false,
            fail_ranker: false,
            fail_load: false,
            log: Rc::clone(log),
        }
    }
}

impl ModelLoader for FakeLoader {
    type Caption = FakeCaption;
    type Ranker = FakeRanker;

    fn load_caption(&self) -> Result<FakeCaption> {
        if self.fail_load {
            return Err(Error::ModelFileNotFound {
                path: "blip/vision_encoder.onnx".into(),
            });
        }
        self.log.borrow_mut().loads += 1;
        Ok(FakeCaption {
            placement: Placement::Host,
            fail: self.fail_caption,
            log: Rc::clone(&self.log),
        })
    }

    fn load_ranker(&self) -> Result<FakeRanker> {
        self.log.borrow_mut().loads += 1;
        Ok(FakeRanker {
            placement: Placement::Host,
            fail: self.fail_ranker,
            log: Rc::clone(&self.log),
        })
    }
}

fn settings(keep: bool, memory: MemoryMode) -> InterrogateSettings {
    InterrogateSettings {
        caption: CaptionParams {
            num_beams: 1,
            min_length: 24,
            max_length: 48,
        },
        clip_dict_limit: 0,
        use_builtin_artists: true,
        residency: ResidencyPolicy::new(keep, memory),
    }
}

fn categories() -> Vec<Category> {
    vec![
        Category {
            name: "flavors.top2.txt".to_string(),
            topn: 2,
            items: vec![
                "dog photo".to_string(),
                "cat photo".to_string(),
                "bird photo".to_string(),
            ],
        },
        Category {
            name: "mediums.txt".to_string(),
            topn: 1,
            items: vec!["oil painting".to_string(), "cat drawing".to_string()],
        },
    ]
}

fn artists() -> Vec<Artist> {
    ["Claude Monet", "Catrin Welz-Stein"]
        .into_iter()
        .map(|name| Artist {
            name: name.to_string(),
            score: 0.5,
            category: "painting".to_string(),
        })
        .collect()
}

fn image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(8, 8))
}

#[test]
fn test_interrogate_combines_caption_artist_and_categories() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut interrogator = Interrogator::new(
        categories(),
        artists(),
        settings(false, MemoryMode::Normal),
        FakeLoader::new(&log),
    );

    let result = interrogator.interrogate(&image());
    assert_eq!(
        result,
        "a cat sitting on a mat, by Catrin Welz-Stein, cat photo, dog photo, cat drawing"
    );
    assert_eq!(interrogator.precision(), Some(Precision::Half));
}

#[test]
fn test_models_return_to_host_after_interrogation() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut interrogator = Interrogator::new(
        categories(),
        Vec::new(),
        settings(false, MemoryMode::Normal),
        FakeLoader::new(&log),
    );

    interrogator.interrogate(&image());
    assert_eq!(
        interrogator.caption_model().map(Placeable::placement),
        Some(Placement::Host)
    );
    assert_eq!(
        interrogator.ranking_model().map(Placeable::placement),
        Some(Placement::Host)
    );
}

#[test]
fn test_keep_models_in_memory_leaves_models_on_device() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut interrogator = Interrogator::new(
        categories(),
        Vec::new(),
        settings(true, MemoryMode::Normal),
        FakeLoader::new(&log),
    );

    interrogator.interrogate(&image());
    interrogator.interrogate(&image());
    assert_eq!(
        interrogator.caption_model().map(Placeable::placement),
        Some(Placement::Device)
    );
    assert_eq!(
        interrogator.ranking_model().map(Placeable::placement),
        Some(Placement::Device)
    );
    assert_eq!(log.borrow().host_moves, 0);
    assert_eq!(log.borrow().loads, 2, "models are created once");
}

#[test]
fn test_low_memory_offloads_even_when_kept() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut interrogator = Interrogator::new(
        categories(),
        Vec::new(),
        settings(true, MemoryMode::Low),
        FakeLoader::new(&log),
    );

    interrogator.interrogate(&image());
    assert_eq!(log.borrow().host_moves, 0, "nothing loaded yet to offload");

    interrogator.interrogate(&image());
    assert_eq!(log.borrow().host_moves, 2);
    assert_eq!(
        interrogator.caption_model().map(Placeable::placement),
        Some(Placement::Device)
    );
}

#[test]
fn test_caption_failure_yields_error_marker() {
    let log = Rc::new(RefCell::new(Log::default()));
    let loader = FakeLoader {
        fail_caption: true,
        ..FakeLoader::new(&log)
    };
    let mut interrogator =
        Interrogator::new(categories(), artists(), settings(false, MemoryMode::Normal), loader);

    assert_eq!(interrogator.interrogate(&image()), "<error>");
    assert_eq!(
        interrogator.caption_model().map(Placeable::placement),
        Some(Placement::Host)
    );
    assert_eq!(
        interrogator.ranking_model().map(Placeable::placement),
        Some(Placement::Host)
    );
}

#[test]
fn test_ranking_failure_keeps_partial_result() {
    let log = Rc::new(RefCell::new(Log::default()));
    let loader = FakeLoader {
        fail_ranker: true,
        ..FakeLoader::new(&log)
    };
    let mut interrogator =
        Interrogator::new(categories(), artists(), settings(false, MemoryMode::Normal), loader);

    assert_eq!(
        interrogator.interrogate(&image()),
        "a cat sitting on a mat<error>"
    );
}

#[test]
fn test_load_failure_yields_error_marker() {
    let log = Rc::new(RefCell::new(Log::default()));
    let loader = FakeLoader {
        fail_load: true,
        ..FakeLoader::new(&log)
    };
    let mut interrogator =
        Interrogator::new(categories(), artists(), settings(false, MemoryMode::Normal), loader);

    assert_eq!(interrogator.interrogate(&image()), "<error>");
    assert!(interrogator.caption_model().is_none());
}

#[test]
fn test_dict_limit_truncates_candidates() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut config = settings(false, MemoryMode::Normal);
    config.clip_dict_limit = 1;
    config.use_builtin_artists = false;
    let mut interrogator = Interrogator::new(categories(), Vec::new(), config, FakeLoader::new(&log));

    let result = interrogator.interrogate(&image());
    assert_eq!(result, "a cat sitting on a mat, dog photo, oil painting");
    assert_eq!(log.borrow().texts_ranked, vec![1, 1]);
}

#[test]
fn test_builtin_artists_disabled() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut config = settings(false, MemoryMode::Normal);
    config.use_builtin_artists = false;
    let mut interrogator = Interrogator::new(Vec::new(), artists(), config, FakeLoader::new(&log));

    assert_eq!(interrogator.interrogate(&image()), "a cat sitting on a mat");
}
