//! `weave tokenize` — Show how the configured encoder splits text.

use weave_config::AppConfig;
use weave_core::Tokenizer;

pub async fn run(text: String, encoder: Option<String>) -> weave_core::Result<()> {
    let config = AppConfig::load()?;
    let spec = encoder.unwrap_or(config.encoder);
    let (tokenizer, variant) = weave_tokenizer::from_encoder(&spec)?;

    let ids = tokenizer.encode(&text, &variant).await?;
    println!("Encoder: {variant}");
    println!("Tokens:  {}", ids.len());
    println!("Ids:     {ids:?}");
    Ok(())
}
