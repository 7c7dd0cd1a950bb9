//! Weight loading from safetensors
//!
//! A model directory holds either a single `model.safetensors` or shards
//! listed in `model.safetensors.index.json`. Tensor names follow the module
//! tree, e.g. `encoder.forward_gru.input_proj.weight`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use memmap2::Mmap;
use safetensors::SafeTensors;
use serde::Deserialize;

/// Index file structure for sharded weights
#[derive(Debug, Deserialize)]
pub struct SafetensorsIndex {
    pub metadata: Option<serde_json::Value>,
    pub weight_map: HashMap<String, String>,
}

/// Safetensors files making up the model, in load order
pub fn weight_files<P: AsRef<Path>>(model_dir: P) -> Result<Vec<PathBuf>> {
    let model_dir = model_dir.as_ref();
    let index_path = model_dir.join("model.safetensors.index.json");

    if index_path.exists() {
        let content = std::fs::read_to_string(&index_path)
            .context("Failed to read model.safetensors.index.json")?;
        let index: SafetensorsIndex = serde_json::from_str(&content)?;
        let shards: BTreeSet<&String> = index.weight_map.values().collect();
        return Ok(shards.into_iter().map(|f| model_dir.join(f)).collect());
    }

    let single_path = model_dir.join("model.safetensors");
    if single_path.exists() {
        Ok(vec![single_path])
    } else {
        anyhow::bail!(
            "No model.safetensors or model.safetensors.index.json in {}",
            model_dir.display()
        )
    }
}

/// Load all model weights into a VarBuilder
pub fn load_model_vb<P: AsRef<Path>>(
    model_dir: P,
    dtype: DType,
    device: &Device,
) -> Result<VarBuilder<'static>> {
    let files = weight_files(model_dir)?;
    let mut all_tensors: HashMap<String, Tensor> = HashMap::new();

    for (i, path) in files.iter().enumerate() {
        tracing::debug!("Loading weight file {}/{}: {}", i + 1, files.len(), path.display());
        all_tensors.extend(load_safetensors_file(path, dtype, device)?);
    }

    tracing::info!("Loaded {} tensors from {} file(s)", all_tensors.len(), files.len());
    Ok(VarBuilder::from_tensors(all_tensors, dtype, device))
}

/// Tensor names and shapes without materializing any data
pub fn weight_shapes<P: AsRef<Path>>(model_dir: P) -> Result<BTreeMap<String, Vec<usize>>> {
    let mut shapes = BTreeMap::new();
    for path in weight_files(model_dir)? {
        let mmap = map_file(&path)?;
        let st = SafeTensors::deserialize(&mmap)?;
        for name in st.names() {
            shapes.insert(name.to_string(), st.tensor(name)?.shape().to_vec());
        }
    }
    Ok(shapes)
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = std::fs::File::open(path).context(format!("Failed to open {}", path.display()))?;
    // Weight files are treated as read-only for the lifetime of the map
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

fn load_safetensors_file(path: &Path, dtype: DType, device: &Device) -> Result<HashMap<String, Tensor>> {
    let mmap = map_file(path)?;
    let st = SafeTensors::deserialize(&mmap)?;

    let mut tensors = HashMap::new();
    for name in st.names() {
        let view = st.tensor(name)?;
        let tensor = float_tensor_from_view(&view, device)
            .with_context(|| format!("Tensor {} in {}", name, path.display()))?;
        tensors.insert(name.to_string(), tensor.to_dtype(dtype)?);
    }
    Ok(tensors)
}

/// Convert a floating point safetensors view into a candle Tensor
///
/// The GRU model only stores float weights; integer tensors are rejected.
fn float_tensor_from_view(view: &safetensors::tensor::TensorView, device: &Device) -> Result<Tensor> {
    use safetensors::Dtype as StDtype;

    let shape: Vec<usize> = view.shape().to_vec();
    let data = view.data();

    let tensor = match view.dtype() {
        StDtype::F32 => {
            let values: Vec<f32> = data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            Tensor::from_vec(values, shape.as_slice(), device)?
        }
        StDtype::F16 => {
            let values: Vec<half::f16> = data
                .chunks_exact(2)
                .map(|b| half::f16::from_le_bytes([b[0], b[1]]))
                .collect();
            Tensor::from_vec(values, shape.as_slice(), device)?
        }
        StDtype::BF16 => {
            let values: Vec<half::bf16> = data
                .chunks_exact(2)
                .map(|b| half::bf16::from_le_bytes([b[0], b[1]]))
                .collect();
            Tensor::from_vec(values, shape.as_slice(), device)?
        }
        other => anyhow::bail!("Unsupported weight dtype: {:?}", other),
    };
    Ok(tensor)
}
