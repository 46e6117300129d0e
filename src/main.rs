use anyhow::{anyhow, Result};
use clap::Parser;
use kiss3d::{light::Light, window::Window};
use rhaisketch::{
    applet::Applet, config::SketchConfig, constants::ConstantTable, runner::Runner, Script,
    Session, SketchDriver,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rhaisketch")]
#[command(about = "Run a rhai sketch in a window")]
struct Cli {
    /// Sketch script to run
    script: PathBuf,

    /// RON sketch configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window title, overriding the config
    #[arg(short, long)]
    title: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_module("kiss3d", log::LevelFilter::Warn)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SketchConfig::load(path)
            .map_err(|err| anyhow!("Loading {}: {err}", path.display()))?,
        None => SketchConfig::default(),
    };
    if let Some(title) = cli.title {
        config.title = title;
    }

    let mut constants = ConstantTable::processing();
    constants.extend_from_ron(&config.constants);

    let script = Script::load(&cli.script)
        .map_err(|err| anyhow!("Reading {}: {err}", cli.script.display()))?;
    let applet = Applet::new(&config);
    // Script errors hold interpreter values, which are not `Send`.
    let driver = SketchDriver::new(Session::new(), script, applet, Applet::glue(), &constants)
        .map_err(|err| anyhow!("{err}"))?;
    log::info!("Running {} in {:?} mode", driver.script().id(), driver.mode());

    let mut window = Window::new_with_size(&config.title, config.width, config.height);
    window.set_light(Light::StickToCamera);
    window.render_loop(Runner::new(driver));
    Ok(())
}
