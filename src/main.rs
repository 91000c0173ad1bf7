use anyhow::{Result, bail};
use clap::Parser;
use std::time::Instant;

use multi_search::Config;
use multi_search::cli::Args;
use multi_search::logging::setup_run_logging;
use multi_search::outlet::{DiskOutlet, Outlet};
use multi_search::pipeline::{QueryInput, QueryPipeline, cancel_signal};
use multi_search::rag::{KnowledgeBaseInitializer, create_embedder};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.into_config()?;

    if args.init {
        return init_knowledge_base(&args, &config).await;
    }

    let Some(question) = args
        .question
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
    else {
        bail!("No question given: use --q <问题>, or --init to build the knowledge base");
    };

    let log_path = setup_run_logging(&config.log_dir, "q", config.verbose)?;
    println!("日志文件：{}", log_path.display());

    let started = Instant::now();
    println!("🔍 正在检索：{}", question);
    let pipeline = QueryPipeline::from_config(&config).await?;
    let input = QueryInput {
        question: question.to_string(),
        top_k: config.retrieval.top_k,
        province_override: args.province.clone(),
    };
    let outcome = pipeline
        .run_until_cancelled(input, cancel_signal(tokio::signal::ctrl_c()))
        .await?;

    println!(
        "✅ 完成，省份：{}，解码状态：{}，耗时 {:.2}s",
        outcome.province.as_deref().unwrap_or("未识别"),
        outcome.decode_state,
        started.elapsed().as_secs_f64()
    );

    let outlet = DiskOutlet::new(&config.output_path);
    let written = outlet.save(&outcome.to_document()).await?;
    println!("💾 已生成Markdown：{}", written.display());
    println!("日志文件：{}", log_path.display());

    Ok(())
}

async fn init_knowledge_base(args: &Args, config: &Config) -> Result<()> {
    let log_path = setup_run_logging(&config.log_dir, "init_data", config.verbose)?;
    println!("日志文件：{}", log_path.display());

    let embedder = create_embedder(&config.embedding)?;
    let initializer = KnowledgeBaseInitializer::new(config.knowledge_base.clone(), embedder);
    let summary = initializer.run(args.reset, config.verbose).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.skipped_empty_files.is_empty() {
        println!("⚠️ 跳过空文件 {} 个", summary.skipped_empty_files.len());
    }
    println!("✅ 初始化完成，共 {} 个切片", summary.total_chunks);
    println!("日志文件：{}", log_path.display());

    Ok(())
}
