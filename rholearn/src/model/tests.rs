//! Tests for local and global models

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::RholearnError;
    use crate::tensor::{Labels, SphericalKey, TensorBlock, TensorMap, CENTER, STRUCTURE};
    use approx::assert_abs_diff_eq;
    use nalgebra::DMatrix;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use spherical::SphericalError;
    use std::collections::BTreeMap;

    fn atom_samples(n_structures: usize) -> Labels {
        Labels::new(
            vec![STRUCTURE, CENTER],
            (0..n_structures as i32).map(|s| vec![s, 0]).collect(),
        )
        .unwrap()
    }

    fn random_block(lambda: i32, n_structures: usize, n_props: usize, rng: &mut StdRng) -> TensorBlock {
        let values = (0..2 * lambda + 1)
            .map(|_| DMatrix::from_fn(n_structures, n_props, |_, _| rng.gen_range(-1.0..1.0)))
            .collect();
        TensorBlock::new(
            atom_samples(n_structures),
            Labels::spherical_components(lambda),
            Labels::range("n", n_props),
            values,
        )
        .unwrap()
    }

    fn random_input(keys: &[SphericalKey], n_structures: usize, n_props: usize, seed: u64) -> TensorMap<SphericalKey> {
        let mut rng = StdRng::seed_from_u64(seed);
        let blocks = keys
            .iter()
            .map(|k| random_block(k.lambda, n_structures, n_props, &mut rng))
            .collect();
        TensorMap::new(keys.to_vec(), blocks).unwrap()
    }

    fn layouts(keys: &[SphericalKey], n_in: usize, n_out: usize) -> Vec<(SphericalKey, BlockLayout)> {
        keys.iter()
            .map(|&k| {
                (
                    k,
                    BlockLayout {
                        in_properties: n_in,
                        out_properties: n_out,
                        in_invariant_features: n_in,
                    },
                )
            })
            .collect()
    }

    fn nonlinear(activation: Activation, bias: bool) -> ModelArchitecture {
        ModelArchitecture::Nonlinear {
            hidden_layer_widths: vec![6, 4],
            activation,
            bias,
        }
    }

    #[test]
    fn test_bias_rejected_for_covariant_blocks() {
        let mut rng = StdRng::seed_from_u64(0);
        let linear = EquiLinear::new(2, 3, 2, true, &mut rng);
        assert!(matches!(linear, Err(RholearnError::Config(_))));

        let gated = EquiNonlinear::new(2, 3, 3, &[4], Activation::Tanh, 2, true, &mut rng);
        assert!(matches!(gated, Err(RholearnError::Config(_))));

        assert!(EquiLinear::new(0, 3, 2, true, &mut rng).is_ok());
    }

    #[test]
    fn test_invalid_construction() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            EquiLinear::new(-1, 3, 2, false, &mut rng),
            Err(RholearnError::Spherical(SphericalError::InvalidOrder(-1)))
        ));
        assert!(matches!(
            EquiNonlinear::new(1, 3, 3, &[], Activation::Gelu, 2, false, &mut rng),
            Err(RholearnError::Config(_))
        ));
        assert!(matches!(
            EquiNonlinear::new(1, 3, 3, &[4, 0], Activation::Gelu, 2, false, &mut rng),
            Err(RholearnError::Config(_))
        ));
    }

    #[test]
    fn test_mlp_layer_structure() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(Mlp::new(3, &[], Activation::Tanh, &mut rng), Err(RholearnError::Config(_))));

        let mlp = Mlp::new(3, &[5, 4], Activation::Tanh, &mut rng).unwrap();
        let widths: Vec<_> = mlp.layers().iter().map(|l| (l.in_features(), l.out_features())).collect();
        assert_eq!(widths, vec![(3, 5), (5, 4)]);
        let (y, _) = mlp.forward_cached(&DMatrix::from_element(2, 3, 0.1)).unwrap();
        assert_eq!(y.shape(), (2, 4));
    }

    #[test]
    fn test_example_scenario_shapes() {
        let keys = [SphericalKey::new(0, 1), SphericalKey::new(1, 1)];
        let input = random_input(&keys, 2, 3, 11);
        let model = EquiModelGlobal::new(ModelArchitecture::Linear { bias: true }, layouts(&keys, 3, 2), 5).unwrap();

        let out = model.forward(&input).unwrap();
        assert_eq!(out.keys(), &keys);
        assert_eq!(out.get(&keys[0]).unwrap().shape(), (2, 1, 2));
        assert_eq!(out.get(&keys[1]).unwrap().shape(), (2, 3, 2));
        assert_eq!(out.get(&keys[1]).unwrap().samples(), input.get(&keys[1]).unwrap().samples());
    }

    #[test]
    fn test_linear_matches_matrix_product() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = random_block(1, 4, 3, &mut rng);
        let model = EquiLinear::new(1, 3, 2, false, &mut rng).unwrap();
        let out = model.forward(&x).unwrap();
        for (xm, ym) in x.values().iter().zip(&out) {
            let expected = xm * model.layer.weight.value.transpose();
            assert_abs_diff_eq!(ym, &expected, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_missing_key_is_zero_padded() {
        let keys = [SphericalKey::new(0, 8), SphericalKey::new(1, 8), SphericalKey::new(2, 8)];
        let full = random_input(&keys, 3, 4, 1);
        let partial = full.filter(|k, _| k.lambda != 2);

        let model = EquiModelGlobal::new(ModelArchitecture::Linear { bias: true }, layouts(&keys, 4, 2), 9).unwrap();
        let out = model.forward(&partial).unwrap();

        let padded = out.get(&keys[2]).unwrap();
        assert_eq!(padded.shape(), (3, 5, 2));
        assert_eq!(padded.samples(), full.get(&keys[0]).unwrap().samples());
        assert!(padded.values().iter().all(|v| v.iter().all(|&x| x == 0.0)));
    }

    #[test]
    fn test_padding_without_same_species_block_has_no_samples() {
        let keys = [SphericalKey::new(0, 1), SphericalKey::new(0, 6)];
        let input = random_input(&keys[..1], 2, 3, 4);
        let model = EquiModelGlobal::new(ModelArchitecture::Linear { bias: false }, layouts(&keys, 3, 2), 2).unwrap();
        let out = model.forward(&input).unwrap();
        assert_eq!(out.get(&keys[1]).unwrap().shape(), (0, 1, 2));
    }

    #[test]
    fn test_missing_invariant_is_reported() {
        let keys = [SphericalKey::new(0, 1), SphericalKey::new(1, 1), SphericalKey::new(1, 8)];
        let input = random_input(&keys, 2, 3, 6);
        let model = EquiModelGlobal::new(nonlinear(Activation::Silu, false), layouts(&keys, 3, 2), 0).unwrap();

        let without_oxygen_invariant = input.clone();
        assert!(model.forward(&without_oxygen_invariant).is_err_and(
            |e| matches!(e, RholearnError::MissingInvariant { species: 8, .. })
        ));

        let mut with_invariant = input;
        let mut rng = StdRng::seed_from_u64(1);
        with_invariant
            .insert(SphericalKey::new(0, 8), random_block(0, 2, 3, &mut rng))
            .unwrap();
        assert!(model.forward(&with_invariant).is_ok());
    }

    #[test]
    fn test_property_mismatch_is_rejected() {
        let keys = [SphericalKey::new(1, 1)];
        let input = random_input(&keys, 2, 5, 0);
        let model = EquiModelGlobal::new(ModelArchitecture::Linear { bias: false }, layouts(&keys, 3, 2), 0).unwrap();
        assert!(matches!(model.forward(&input), Err(RholearnError::DimensionMismatch(_))));
    }

    #[test]
    fn test_invariant_with_other_samples_is_rejected() {
        let mut rng = StdRng::seed_from_u64(8);
        let x = random_block(1, 3, 2, &mut rng);
        let invariant = random_block(0, 2, 2, &mut rng);
        let model = EquiNonlinear::new(1, 2, 2, &[3], Activation::Tanh, 2, false, &mut rng).unwrap();
        assert!(matches!(
            model.forward(&x, &invariant),
            Err(RholearnError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let key = SphericalKey::new(0, 1);
        let layouts = layouts(&[key, key], 2, 2);
        assert!(matches!(
            EquiModelGlobal::new(ModelArchitecture::Linear { bias: false }, layouts, 0),
            Err(RholearnError::Config(_))
        ));
    }

    fn weighted_sum(out: &TensorMap<SphericalKey>, weights: &TensorMap<SphericalKey>) -> f64 {
        out.iter()
            .map(|(k, b)| {
                b.values()
                    .iter()
                    .zip(weights.get(k).unwrap().values())
                    .map(|(o, w)| o.component_mul(w).sum())
                    .sum::<f64>()
            })
            .sum()
    }

    fn check_gradients(model: &mut EquiModelGlobal, input: &TensorMap<SphericalKey>) {
        let mut rng = StdRng::seed_from_u64(42);
        let out = model.forward(input).unwrap();
        let mut weights = TensorMap::empty();
        for (key, block) in out.iter() {
            let values = block
                .values()
                .iter()
                .map(|v| DMatrix::from_fn(v.nrows(), v.ncols(), |_, _| rng.gen_range(-1.0..1.0)))
                .collect();
            weights.insert(*key, block.with_values(values).unwrap()).unwrap();
        }

        model.zero_grad();
        model.backward(input, &weights).unwrap();
        let analytic: Vec<(String, DMatrix<f64>)> = model
            .parameters()
            .into_iter()
            .map(|(name, p)| (name, p.grad.clone()))
            .collect();
        assert!(!analytic.is_empty());

        let h = 1e-6;
        for (idx, (name, grad)) in analytic.iter().enumerate() {
            for e in 0..grad.len() {
                let original = model.parameters()[idx].1.value[e];
                model.parameters_mut()[idx].1.value[e] = original + h;
                let plus = weighted_sum(&model.forward(input).unwrap(), &weights);
                model.parameters_mut()[idx].1.value[e] = original - h;
                let minus = weighted_sum(&model.forward(input).unwrap(), &weights);
                model.parameters_mut()[idx].1.value[e] = original;

                let numerical = (plus - minus) / (2.0 * h);
                assert!(
                    (grad[e] - numerical).abs() < 1e-5,
                    "{}[{}]: analytic {} vs numerical {}",
                    name,
                    e,
                    grad[e],
                    numerical
                );
            }
        }
    }

    #[test]
    fn test_linear_gradients_match_finite_differences() {
        let keys = [SphericalKey::new(0, 1), SphericalKey::new(1, 1), SphericalKey::new(2, 1)];
        let input = random_input(&keys, 3, 3, 21);
        let mut model =
            EquiModelGlobal::new(ModelArchitecture::Linear { bias: true }, layouts(&keys, 3, 2), 4).unwrap();
        check_gradients(&mut model, &input);
    }

    #[test]
    fn test_nonlinear_gradients_match_finite_differences() {
        let keys = [SphericalKey::new(0, 6), SphericalKey::new(1, 6), SphericalKey::new(2, 6)];
        let input = random_input(&keys, 3, 3, 22);
        for activation in [Activation::Tanh, Activation::Gelu, Activation::Silu] {
            let mut model = EquiModelGlobal::new(nonlinear(activation, true), layouts(&keys, 3, 2), 4).unwrap();
            check_gradients(&mut model, &input);
        }
    }

    #[test]
    fn test_gradients_accumulate_until_zeroed() {
        let keys = [SphericalKey::new(1, 1)];
        let input = random_input(&keys, 2, 2, 3);
        let mut model = EquiModelGlobal::new(ModelArchitecture::Linear { bias: false }, layouts(&keys, 2, 2), 1).unwrap();
        let ones = model.forward(&input).unwrap();
        let ones = ones
            .map_blocks(|_, b| b.with_values(b.values().iter().map(|v| v.map(|_| 1.0)).collect()))
            .unwrap();

        model.backward(&input, &ones).unwrap();
        let once = model.parameters()[0].1.grad.clone();
        model.backward(&input, &ones).unwrap();
        assert_abs_diff_eq!(model.parameters()[0].1.grad, once * 2.0, epsilon = 1e-12);

        model.zero_grad();
        assert!(model.parameters().iter().all(|(_, p)| p.grad.iter().all(|&g| g == 0.0)));
    }

    #[test]
    fn test_parameter_names() {
        let keys = [SphericalKey::new(0, 1), SphericalKey::new(1, 1)];
        let model = EquiModelGlobal::new(nonlinear(Activation::Tanh, true), layouts(&keys, 3, 2), 0).unwrap();
        let names: Vec<String> = model.parameters().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"lambda0_species1.input.bias".to_string()));
        assert!(names.contains(&"lambda1_species1.gate.1.bias".to_string()));
        assert!(!names.contains(&"lambda1_species1.input.bias".to_string()));
        assert!(!names.contains(&"lambda1_species1.output.bias".to_string()));
    }

    #[test]
    fn test_state_dict_roundtrip() {
        let keys = [SphericalKey::new(0, 1), SphericalKey::new(1, 1)];
        let input = random_input(&keys, 2, 3, 5);
        let arch = nonlinear(Activation::Gelu, true);
        let trained = EquiModelGlobal::new(arch.clone(), layouts(&keys, 3, 2), 1).unwrap();
        let mut fresh = EquiModelGlobal::new(arch, layouts(&keys, 3, 2), 2).unwrap();
        assert_ne!(trained.state_dict(), fresh.state_dict());

        fresh.load_state_dict(&trained.state_dict()).unwrap();
        assert!(fresh.forward(&input).unwrap().allclose(&trained.forward(&input).unwrap(), 0.0, 0.0));

        let mut bad: BTreeMap<String, DMatrix<f64>> = trained.state_dict();
        bad.insert("lambda1_species1.input.weight".to_string(), DMatrix::zeros(1, 1));
        assert!(matches!(fresh.load_state_dict(&bad), Err(RholearnError::DimensionMismatch(_))));

        let mut extra = trained.state_dict();
        extra.insert("unknown".to_string(), DMatrix::zeros(1, 1));
        assert!(matches!(fresh.load_state_dict(&extra), Err(RholearnError::Config(_))));
    }

    #[test]
    fn test_checkpoint_file_roundtrip() {
        let keys = [SphericalKey::new(0, 8), SphericalKey::new(2, 8)];
        let input = random_input(&keys, 2, 4, 9);
        let model = EquiModelGlobal::new(ModelArchitecture::Linear { bias: true }, layouts(&keys, 4, 3), 7).unwrap();

        let path = std::env::temp_dir().join(format!("rholearn_checkpoint_{}.json", std::process::id()));
        model.save(&path).unwrap();
        let loaded = EquiModelGlobal::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, model);
        assert!(loaded.forward(&input).unwrap().allclose(&model.forward(&input).unwrap(), 0.0, 0.0));
    }

    #[test]
    fn test_from_templates_reads_property_counts() {
        let keys = [SphericalKey::new(0, 1), SphericalKey::new(1, 1)];
        let input = random_input(&keys, 2, 5, 0);
        let target = random_input(&keys, 2, 2, 1);
        let model = EquiModelGlobal::from_templates(nonlinear(Activation::Silu, true), &input, &target, 3).unwrap();
        let layout = model.layout(&keys[1]).unwrap();
        assert_eq!((layout.in_properties, layout.out_properties, layout.in_invariant_features), (5, 2, 5));
        assert_eq!(model.forward(&input).unwrap().get(&keys[1]).unwrap().shape(), (2, 3, 2));
    }

    #[test]
    fn test_architecture_yaml() {
        let arch: ModelArchitecture =
            serde_yml::from_str("type: nonlinear\nhidden_layer_widths: [8, 4]\nactivation: gelu\n").unwrap();
        assert_eq!(arch, nonlinear_widths(vec![8, 4], Activation::Gelu));
        let arch: ModelArchitecture = serde_yml::from_str("type: linear\nbias: true\n").unwrap();
        assert!(arch.bias());
        assert_eq!("Swish".parse::<Activation>().unwrap(), Activation::Silu);
        assert!("relu".parse::<Activation>().is_err());
    }

    fn nonlinear_widths(widths: Vec<usize>, activation: Activation) -> ModelArchitecture {
        ModelArchitecture::Nonlinear {
            hidden_layer_widths: widths,
            activation,
            bias: false,
        }
    }
}
