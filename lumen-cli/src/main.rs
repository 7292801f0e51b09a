mod scenes;

use anyhow::{anyhow, Result};
use clap::{App, Arg, ArgMatches};
use flexi_logger::Logger;
use log::info;

use lumen_core::integrator::{
    BdptIntegrator, DirectLightingIntegrator, Integrator, MmltIntegrator, PathIntegrator,
    PhotonMapperIntegrator, PssmltIntegrator, SamplerRenderer, SppmIntegrator, VcmUpsIntegrator,
};
use lumen_core::renderparams::RenderParams;
use lumen_core::sampler::{RandomSampler, Sampler, ZeroTwoSequenceSampler};

fn parse_args() -> ArgMatches<'static> {
    App::new("lumen")
        .about("Physically-based offline renderer")
        .arg(
            Arg::with_name("integrator")
                .short("i")
                .long("integrator")
                .takes_value(true)
                .default_value("path")
                .possible_values(&[
                    "path", "direct", "bdpt", "sppm", "photonmap", "pssmlt", "mmlt", "vcm",
                ]),
        )
        .arg(
            Arg::with_name("scene")
                .short("s")
                .long("scene")
                .takes_value(true)
                .default_value("cornell")
                .possible_values(&["cornell", "cornell-glass", "furnace", "slab"]),
        )
        .arg(
            Arg::with_name("spp")
                .long("spp")
                .takes_value(true)
                .default_value("16"),
        )
        .arg(
            Arg::with_name("size")
                .long("size")
                .takes_value(true)
                .default_value("512"),
        )
        .arg(
            Arg::with_name("depth")
                .long("max-depth")
                .takes_value(true)
                .default_value("8"),
        )
        .arg(
            Arg::with_name("sampler")
                .long("sampler")
                .takes_value(true)
                .default_value("lds")
                .possible_values(&["lds", "random"]),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .default_value("lumen.png"),
        )
        .get_matches()
}

fn main() {
    println!("Lumen 0.1 [detected {} cores]", num_cpus::get());
    let matches = parse_args();

    Logger::try_with_env_or_str("lumen=info,lumen_core=info")
        .unwrap()
        .start()
        .unwrap_or_else(|e| panic!("Failed to initialize logger: {}", e));

    if let Err(e) = run(&matches) {
        eprintln!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches<'_>) -> Result<()> {
    let spp: usize = matches.value_of("spp").unwrap().parse()?;
    let size: i32 = matches.value_of("size").unwrap().parse()?;
    let max_depth: i32 = matches.value_of("depth").unwrap().parse()?;
    let output = matches.value_of("output").unwrap();
    let scene_name = matches.value_of("scene").unwrap();
    let integrator_name = matches.value_of("integrator").unwrap();

    let mut params = RenderParams::new();
    params.set_int("sampleCount", spp as i32);
    params.set_int("maxDepth", max_depth);

    let sampler: Box<dyn Sampler> = match matches.value_of("sampler").unwrap() {
        "random" => Box::new(RandomSampler::new(1, 0)),
        _ => Box::new(ZeroTwoSequenceSampler::new(1, 8)),
    };

    let built = match scene_name {
        "cornell" => scenes::cornell_box(size, output),
        "cornell-glass" => scenes::cornell_box_glass(size, output),
        "furnace" => scenes::furnace(size, output),
        "slab" => scenes::medium_slab(size, output),
        other => return Err(anyhow!("unknown scene '{}'", other)),
    };
    let (camera, scene) = built;

    info!(
        "Rendering '{}' with the {} integrator",
        scene_name, integrator_name
    );
    let mut integrator: Box<dyn Integrator> = match integrator_name {
        "path" => Box::new(SamplerRenderer::new(PathIntegrator::new(), sampler)),
        "direct" => Box::new(SamplerRenderer::new(
            DirectLightingIntegrator::new(),
            sampler,
        )),
        "photonmap" => Box::new(SamplerRenderer::new(
            PhotonMapperIntegrator::new(),
            sampler,
        )),
        "bdpt" => Box::new(BdptIntegrator::new(sampler)),
        "sppm" => Box::new(SppmIntegrator::new(sampler)),
        "pssmlt" => Box::new(PssmltIntegrator::new()),
        "mmlt" => Box::new(MmltIntegrator::new()),
        "vcm" => Box::new(VcmUpsIntegrator::new(sampler)),
        other => return Err(anyhow!("unknown integrator '{}'", other)),
    };

    integrator.render(camera.as_ref(), &scene, &params)?;
    Ok(())
}
