//! GRU model loaded from safetensors on disk

mod common;

use candle_core::{DType, Device, IndexOp};

use common::{char_config, word_level_tokenizer, write_model_dir, END, START};
use seq2seq_rs::batch::{masked_nll, BatchWindow, TrainingBatch};
use seq2seq_rs::model::Seq2SeqModel;
use seq2seq_rs::weights::{load_model_vb, weight_shapes};
use seq2seq_rs::{BeamParams, BeamSearchDecoder, Seq2SeqConfig, SequenceOracle, Translator};

fn load_model(dir: &std::path::Path, config: &Seq2SeqConfig) -> Seq2SeqModel {
    let device = Device::Cpu;
    let vb = load_model_vb(dir, DType::F32, &device).unwrap();
    Seq2SeqModel::new(config, vb, &device).unwrap()
}

#[test]
fn test_weight_shapes_cover_both_directions() {
    let dir = tempfile::tempdir().unwrap();
    let config = char_config(6);
    write_model_dir(dir.path(), &config).unwrap();

    let shapes = weight_shapes(dir.path()).unwrap();
    assert_eq!(shapes["encoder.forward_gru.hidden_proj.weight"], vec![12, 4]);
    assert_eq!(shapes["encoder.backward_gru.input_proj.weight"], vec![12, 4]);
    assert_eq!(shapes["decoder.gru.hidden_proj.weight"], vec![24, 8]);
    assert_eq!(shapes["decoder.output_proj.weight"], vec![16, 8]);
}

#[test]
fn test_loaded_model_decodes_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let config = char_config(6);
    write_model_dir(dir.path(), &config).unwrap();
    let model = load_model(dir.path(), &config);

    let decoder = BeamSearchDecoder::new(&model, config.special_tokens());
    for beam_width in [1, 3] {
        let params = BeamParams::new(beam_width, 6);
        let first = decoder.decode(&[4, 5, 13, 6], &params).unwrap();
        let second = decoder.decode(&[4, 5, 13, 6], &params).unwrap();
        assert_eq!(first, second);
        assert!(first.tokens.len() <= 6);
        assert!(first.log_prob <= 0.0);
        assert!(!first.tokens.contains(&END));
    }
}

#[test]
fn test_forward_batch_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let config = char_config(6);
    write_model_dir(dir.path(), &config).unwrap();
    let model = load_model(dir.path(), &config);

    let sources = vec![vec![4, 5, 6], vec![7, 8]];
    let targets = vec![vec![START, 9, 10, END], vec![START, 11, END]];
    let batch = TrainingBatch::new(
        &sources,
        &targets,
        &BatchWindow::from_config(&config),
        &Device::Cpu,
    )
    .unwrap();

    let probs = model.forward_batch(&batch).unwrap();
    assert_eq!(probs.dims(), &[2, 3, 16]);

    let sums: Vec<Vec<f32>> = probs.sum(2).unwrap().to_vec2().unwrap();
    for row in sums {
        for s in row {
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    let nll = masked_nll(&probs, &batch.decoder_target, &batch.target_mask).unwrap();
    assert!(nll.is_finite());
    assert!(nll > 0.0);
}

#[test]
fn test_forward_batch_first_step_matches_oracle_step() {
    let dir = tempfile::tempdir().unwrap();
    let config = char_config(6);
    write_model_dir(dir.path(), &config).unwrap();
    let model = load_model(dir.path(), &config);

    let source = vec![4u32, 12, 5];
    let batch = TrainingBatch::new(
        &[source.clone()],
        &[vec![START, 9, END]],
        &BatchWindow::from_config(&config),
        &Device::Cpu,
    )
    .unwrap();
    let batched: Vec<f32> = model
        .forward_batch(&batch)
        .unwrap()
        .i((0, 0))
        .unwrap()
        .to_vec1()
        .unwrap();

    let state = model.encode_ids(&source).unwrap();
    let (stepped, _) = model.step_token(&state, START).unwrap();

    assert_eq!(batched.len(), stepped.len());
    for (a, b) in batched.iter().zip(&stepped) {
        assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
    }
}

#[test]
fn test_padding_in_source_does_not_change_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let config = char_config(6);
    write_model_dir(dir.path(), &config).unwrap();
    let model = load_model(dir.path(), &config);

    let plain: Vec<f32> = SequenceOracle::encode(&model, &[4, 5])
        .unwrap()
        .flatten_all()
        .unwrap()
        .to_vec1()
        .unwrap();
    let padded: Vec<f32> = SequenceOracle::encode(&model, &[4, 5, 0, 0])
        .unwrap()
        .flatten_all()
        .unwrap()
        .to_vec1()
        .unwrap();
    assert_eq!(plain, padded);
}

#[test]
fn test_translator_from_pretrained() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = char_config(5);
    config.target_vocab_size = 12;
    write_model_dir(dir.path(), &config).unwrap();

    let source_words = [
        "<pad>", "<s>", "</s>", "<unk>", "hello", "world", "good", "morning", "cat", "dog",
    ];
    let target_words = [
        "<pad>", "<s>", "</s>", "<unk>", "bonjour", "monde", "bon", "matin", "chat", "chien", "le",
        "la",
    ];
    std::fs::write(
        dir.path().join("source_tokenizer.json"),
        word_level_tokenizer(&source_words),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("target_tokenizer.json"),
        word_level_tokenizer(&target_words),
    )
    .unwrap();

    let translator = Translator::from_pretrained(dir.path()).unwrap();
    assert_eq!(translator.config().target_vocab_size, 12);

    let params = translator.default_params();
    let translation = translator.translate("hello world", &params).unwrap();
    assert!(translation.tokens.len() <= 5);
    assert!(translation.tokens.iter().all(|&id| id != END && id < 12));
    if translation.truncated {
        assert_eq!(translation.tokens.len(), 5);
    }

    let again = translator.translate("hello world", &params).unwrap();
    assert_eq!(translation, again);
}

#[test]
fn test_from_pretrained_rejects_oversized_tokenizer() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = char_config(5);
    config.target_vocab_size = 4;
    write_model_dir(dir.path(), &config).unwrap();

    let words = ["<pad>", "<s>", "</s>", "<unk>", "extra"];
    std::fs::write(dir.path().join("source_tokenizer.json"), word_level_tokenizer(&words)).unwrap();
    std::fs::write(dir.path().join("target_tokenizer.json"), word_level_tokenizer(&words)).unwrap();

    assert!(Translator::from_pretrained(dir.path()).is_err());
}
