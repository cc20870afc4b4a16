use std::sync::Mutex;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{api::sync::Api, Repo, RepoType};

use super::{AnalysisError, ImageClassifier, IMAGE_SIZE};

// Class order from the model's config.json.
const LABELS: [&str; 5] = ["drawings", "hentai", "neutral", "porn", "sexy"];

/// ViT NSFW detector backend. Weights are fetched from the Hugging Face hub
/// on first load and cached locally by hf-hub.
pub struct VitClassifier {
    model: Mutex<vit::Model>,
    device: Device,
}

impl VitClassifier {
    pub fn load(repo_id: &str) -> anyhow::Result<Self> {
        let device = Device::Cpu;

        tracing::info!("loading classification model {} on {:?}", repo_id, device);

        let api = Api::new()?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        let model_path = repo.get("model.safetensors")?;
        let config_path = repo.get("config.json")?;

        let config: vit::Config = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[model_path], DType::F32, &device)? };
        let model = vit::Model::new(&config, LABELS.len(), vb)?;

        tracing::info!("classification model loaded");

        Ok(Self {
            model: Mutex::new(model),
            device,
        })
    }

    /// Pack a 224x224 RGB8 buffer into a normalized (1, 3, H, W) tensor.
    /// The model uses mean=0.5, std=0.5 for all channels.
    fn preprocess(&self, rgb: &[u8]) -> candle_core::Result<Tensor> {
        let mean = 0.5;
        let std = 0.5;

        let mut data = vec![0f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
        for i in 0..(IMAGE_SIZE * IMAGE_SIZE) {
            let r = rgb[i * 3] as f32 / 255.0;
            let g = rgb[i * 3 + 1] as f32 / 255.0;
            let b = rgb[i * 3 + 2] as f32 / 255.0;

            // CHW format with normalization
            data[i] = (r - mean) / std;
            data[IMAGE_SIZE * IMAGE_SIZE + i] = (g - mean) / std;
            data[2 * IMAGE_SIZE * IMAGE_SIZE + i] = (b - mean) / std;
        }

        Tensor::from_vec(data, (1, 3, IMAGE_SIZE, IMAGE_SIZE), &self.device)
    }
}

impl ImageClassifier for VitClassifier {
    fn classify(&self, rgb: &[u8]) -> Result<Vec<(String, f32)>, AnalysisError> {
        if rgb.len() != IMAGE_SIZE * IMAGE_SIZE * 3 {
            return Err(AnalysisError::Inference(format!(
                "expected {}x{}x3 RGB input, got {} bytes",
                IMAGE_SIZE,
                IMAGE_SIZE,
                rgb.len()
            )));
        }

        let input = self
            .preprocess(rgb)
            .map_err(|e| AnalysisError::Inference(e.to_string()))?;

        let model = self
            .model
            .lock()
            .map_err(|e| AnalysisError::Inference(format!("model lock poisoned: {}", e)))?;

        let logits = model
            .forward(&input)
            .map_err(|e| AnalysisError::Inference(e.to_string()))?;

        let probs = candle_nn::ops::softmax(&logits, 1)
            .map_err(|e| AnalysisError::Inference(e.to_string()))?;
        let probs: Vec<f32> = probs
            .flatten_all()
            .and_then(|t| t.to_vec1())
            .map_err(|e| AnalysisError::Inference(e.to_string()))?;

        Ok(LABELS
            .iter()
            .zip(probs)
            .map(|(label, prob)| (label.to_string(), prob))
            .collect())
    }
}
