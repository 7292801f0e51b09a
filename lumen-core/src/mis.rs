use log::debug;

use crate::bsdf::BxDFType;
use crate::interaction::Intr;
use crate::sampler::Sampler;
use crate::sampling::{power_heuristic, Distribution1D};
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{min, Point2f};

/// Distribution over the scene's lights proportional to emitted power.
/// Falls back to a uniform pick when every light reports zero power.
pub fn calc_light_power_distrib(scene: &Scene) -> Option<Distribution1D> {
    if scene.lights.is_empty() {
        return None;
    }
    let mut powers: Vec<f32> = scene.lights.iter().map(|l| l.power().gray()).collect();
    if powers.iter().all(|p| *p <= 0.0) {
        for p in powers.iter_mut() {
            *p = 1.0;
        }
    }
    Some(Distribution1D::new(&powers))
}

/// Estimate direct lighting at `intr` by sampling one uniformly chosen
/// light, scaled by the light count.
pub fn uniform_sample_one_light(
    intr: &Intr<'_, '_>,
    scene: &Scene,
    sampler: &mut dyn Sampler,
    handle_media: bool,
) -> Spectrum {
    let n_lights = scene.lights.len();
    if n_lights == 0 {
        return Spectrum::black();
    }

    let light_id = min(
        (sampler.get_1d() * n_lights as f32) as usize,
        n_lights - 1,
    );
    let light = &scene.lights[light_id];
    let rand_light = sampler.get_2d();
    let rand_shade = sampler.get_2d();
    estimate_direct(
        intr,
        &rand_shade,
        light.as_ref(),
        &rand_light,
        scene,
        sampler,
        false,
        handle_media,
    ) * n_lights as f32
}

/// Two-strategy MIS estimate of the direct contribution of one light:
/// sample the light, then sample the BSDF (or phase function).
pub fn estimate_direct(
    intr: &Intr<'_, '_>,
    rand_shade: &Point2f,
    light: &dyn crate::light::Light,
    rand_light: &Point2f,
    scene: &Scene,
    sampler: &mut dyn Sampler,
    specular: bool,
    handle_media: bool,
) -> Spectrum {
    let bsdf_flags = if specular {
        BxDFType::all()
    } else {
        BxDFType::all() & !BxDFType::BSDF_SPECULAR
    };

    let mut ld = Spectrum::black();

    // Sample the light source with MIS
    let reference = intr.as_interaction();
    let li_sample = light.sample_li(&reference, rand_light);
    let mut li = li_sample.li;
    let wi = li_sample.wi;
    let light_pdf = li_sample.pdf;
    if light_pdf > 0.0 && !li.is_black() {
        let (f, scattering_pdf) = match intr {
            Intr::Surface(isect) => {
                let bsdf = isect.bsdf.as_ref().expect("surface should carry a BSDF");
                let f = bsdf.f(&isect.hit.wo, &wi, bsdf_flags)
                    * wi.abs_dotn(&isect.shading.n);
                let pdf = bsdf.pdf(&isect.hit.wo, &wi, bsdf_flags);
                (f, pdf)
            }
            Intr::Medium(mi) => {
                let p = mi.phase.p(&mi.wo, &wi);
                (Spectrum::grey(p), p)
            }
        };

        if !f.is_black() {
            // Visibility, either binary or as a transmittance factor
            if handle_media {
                li = li * li_sample.vis.transmittance(scene, sampler);
            } else if !li_sample.vis.unoccluded(scene) {
                debug!("shadow ray blocked");
                li = Spectrum::black();
            }

            if !li.is_black() {
                if light.is_delta() {
                    ld += f * li / light_pdf;
                } else {
                    let weight = power_heuristic(1, light_pdf, 1, scattering_pdf);
                    ld += f * li * weight / light_pdf;
                }
            }
        }
    }

    // Sample the BSDF / phase function with MIS
    if !light.is_delta() {
        let (f, wi, scattering_pdf, sampled_specular) = match intr {
            Intr::Surface(isect) => {
                let bsdf = isect.bsdf.as_ref().expect("surface should carry a BSDF");
                let (f, wi, pdf, sampled_type) =
                    bsdf.sample_f(&isect.hit.wo, rand_shade, bsdf_flags);
                (
                    f * wi.abs_dotn(&isect.shading.n),
                    wi,
                    pdf,
                    sampled_type.contains(BxDFType::BSDF_SPECULAR),
                )
            }
            Intr::Medium(mi) => {
                let (p, wi) = mi.phase.sample_p(&mi.wo, rand_shade);
                (Spectrum::grey(p), wi, p, false)
            }
        };

        if !f.is_black() && scattering_pdf > 0.0 {
            let weight = if !sampled_specular {
                let light_pdf = light.pdf_li(&reference, &wi);
                if light_pdf == 0.0 {
                    return ld;
                }
                power_heuristic(1, scattering_pdf, 1, light_pdf)
            } else {
                1.0
            };

            // Trace towards the light; either we find the light itself or
            // (for infinite lights) the ray escapes into it.
            let mut ray = intr.spawn_ray(&wi);
            let (found, tr) = if handle_media {
                scene.intersect_tr(&mut ray, sampler)
            } else {
                (scene.intersect(&mut ray), Spectrum::white())
            };

            let li = match &found {
                Some(light_isect) => {
                    let same_light = light_isect
                        .primitive
                        .and_then(|p| p.area_light())
                        .map_or(false, |l| l.id() == light.id());
                    if same_light {
                        light_isect.le(&-wi)
                    } else {
                        Spectrum::black()
                    }
                }
                None => light.le(&ray),
            };

            if !li.is_black() {
                ld += f * li * tr * weight / scattering_pdf;
            }
        }
    }

    ld
}
