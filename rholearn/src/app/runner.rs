use crate::config::{Args, Config, LossKind};
use crate::io::load_tensor_map;
use color_eyre::eyre::{eyre, Result, WrapErr};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rholearn::equivariance::{check_model_equivariance, EquivarianceReport};
use rholearn::tensor::{PairKey, SphericalKey, TensorMap};
use rholearn::{BlockLayout, CoulombLoss, EquiModelGlobal, MseLoss, Reduction};
use spherical::EulerAngles;
use std::collections::BTreeMap;
use tracing::info;

pub struct LossSummary {
    pub kind: LossKind,
    pub reduction: Reduction,
    pub value: f64,
    pub per_structure: Option<BTreeMap<i32, f64>>,
}

/// Load the model from `--load-model`, or initialize one sized by `input`.
pub fn build_model(args: &Args, config: &Config, input: &TensorMap<SphericalKey>) -> Result<EquiModelGlobal> {
    if let Some(path) = &args.load_model {
        info!("Loading model parameters from {}", path);
        return EquiModelGlobal::load(path).wrap_err_with(|| format!("Unable to load model: {}", path));
    }

    let architecture = config.architecture(args)?;
    let out_properties = config.out_properties();
    let layouts = input
        .iter()
        .map(|(key, block)| {
            let in_invariant_features = input
                .get(&key.invariant())
                .map(|b| b.n_properties())
                .unwrap_or(0);
            (
                *key,
                BlockLayout {
                    in_properties: block.n_properties(),
                    out_properties,
                    in_invariant_features,
                },
            )
        })
        .collect();

    info!("Initializing {:?} model", architecture);
    let model = EquiModelGlobal::new(architecture, layouts, config.seed(args))?;
    info!("Model has {} trainable parameters", model.n_parameters());
    Ok(model)
}

/// Compare predict-then-rotate with rotate-then-predict for a seeded random rotation.
pub fn check_equivariance(
    model: &EquiModelGlobal,
    input: &TensorMap<SphericalKey>,
    args: &Args,
    config: &Config,
) -> Result<(EulerAngles, EquivarianceReport<SphericalKey>)> {
    let check = config.equivariance_check(args);
    let mut rng = StdRng::seed_from_u64(check.seed);
    let angles = EulerAngles::random(&mut rng);
    let report = check_model_equivariance(model, input, &angles, &check)?;
    Ok((angles, report))
}

/// Score `prediction` against `--target` when one is given.
pub fn score(prediction: &TensorMap<SphericalKey>, args: &Args, config: &Config) -> Result<Option<LossSummary>> {
    let Some(target_path) = &args.target else {
        return Ok(None);
    };
    let target: TensorMap<SphericalKey> = load_tensor_map(target_path)?;
    let kind = config.loss_kind()?;
    let reduction = config.reduction()?;

    let summary = match kind {
        LossKind::Mse => LossSummary {
            kind,
            reduction,
            value: MseLoss::new(reduction).compute(prediction, &target)?,
            per_structure: None,
        },
        LossKind::Coulomb => {
            let path = args
                .interaction
                .as_ref()
                .ok_or_else(|| eyre!("The coulomb loss needs --interaction"))?;
            let interaction: TensorMap<PairKey> = load_tensor_map(path)?;
            let loss = CoulombLoss::new(interaction, reduction)?.restrict_to(&prediction.structures())?;
            let per_structure = loss.per_structure(prediction, &target)?;
            LossSummary {
                kind,
                reduction,
                value: loss.compute(prediction, &target)?,
                per_structure: Some(per_structure),
            }
        }
    };
    Ok(Some(summary))
}
