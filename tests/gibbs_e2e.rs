use openworld::models::coin_model;
use openworld::proposer::conjugate::{beta_posterior, resample_beta, BetaParams};
use openworld::proposer::{GibbsConfig, VariableGibbsProposer};
use openworld::{ChainConfig, MarkovChain, PartialWorld, Query, Value, Variable, WorldDiff, WorldView};
use rand::rngs::StdRng;
use rand::SeedableRng;

const FLIPS: [bool; 10] = [true, true, false, true, true, false, true, true, false, true];

#[test]
fn coin_posterior_is_beta_9_5() {
    let prior = BetaParams::new(2.0, 2.0).unwrap();
    let coin = coin_model(prior, FLIPS.len()).unwrap();
    let evidence = coin.evidence(&FLIPS).unwrap();

    let gibbs = VariableGibbsProposer::new(
        coin.model.clone(),
        GibbsConfig {
            seed: Some(17),
            resolution: 64,
        },
    )
    .unwrap();
    let mut chain = MarkovChain::new(
        gibbs,
        &evidence,
        vec![Query::new(coin.bias_var())],
        ChainConfig {
            seed: Some(17),
            steps: 3000,
        },
    )
    .unwrap();
    let stats = chain.run().unwrap();
    assert_eq!(stats.accepted, 3000);
    assert_eq!(stats.rejected + stats.skipped, 0);

    let expected = beta_posterior(prior, 7, 10);
    assert_eq!(expected, BetaParams::new(9.0, 5.0).unwrap());
    let mean = chain.mean(&coin.bias_var()).unwrap();
    assert!((mean - expected.mean()).abs() < 0.02, "mean={mean}");

    // Evidence never moves.
    for (i, outcome) in FLIPS.iter().enumerate() {
        let flip = coin.flip_var(i).unwrap();
        assert_eq!(chain.world().value(&flip), Some(&Value::Bool(*outcome)));
        assert!(chain.world().is_observed(&flip));
    }
}

#[test]
fn gibbs_moves_are_exact_and_already_saved() {
    let coin = coin_model(BetaParams::new(1.0, 1.0).unwrap(), 3).unwrap();
    let evidence = coin.evidence(&[true, false, true]).unwrap();
    let mut gibbs = VariableGibbsProposer::new(coin.model.clone(), GibbsConfig::default()).unwrap();
    let world = openworld::Proposer::initialize(&mut gibbs, &evidence, &[]).unwrap();
    let mut diff = WorldDiff::from(world);
    for _ in 0..25 {
        let proposal = openworld::Proposer::propose_next_state(&mut gibbs, &mut diff).unwrap();
        assert_eq!(proposal.ratio(), 1.0);
        assert!(diff.is_clean());
        let bias = diff.value(&coin.bias_var()).and_then(Value::as_real).unwrap();
        assert!(bias > 0.0 && bias < 1.0);
    }
}

#[test]
fn conjugate_beta_mean_converges() {
    let prior = BetaParams::new(2.0, 3.0).unwrap();
    let coin = coin_model(prior, 8).unwrap();
    let mut world = PartialWorld::new(coin.model.clone());
    let heads = [true, false, true, true, false, false, true, true];
    let indicators: Vec<Variable> = (0..heads.len()).map(|i| coin.flip_var(i).unwrap()).collect();
    for (var, h) in indicators.iter().zip(heads) {
        world.set_value(var.clone(), Value::Bool(h)).unwrap();
    }

    let mut rng = StdRng::seed_from_u64(23);
    let n = 5000;
    let mut total = 0.0;
    for _ in 0..n {
        total += resample_beta(&mut world, &coin.bias_var(), prior, &indicators, &mut rng).unwrap();
    }
    let mean = total / f64::from(n);
    let expected = (2.0 + 5.0) / (2.0 + 3.0 + 8.0);
    assert!((mean - expected).abs() < 0.01, "mean={mean} expected={expected}");
}

#[test]
fn conjugate_update_on_seven_of_ten_draws_from_beta_9_5() {
    let prior = BetaParams::new(2.0, 2.0).unwrap();
    let coin = coin_model(prior, FLIPS.len()).unwrap();
    let mut world = PartialWorld::new(coin.model.clone());
    let indicators: Vec<Variable> = (0..FLIPS.len()).map(|i| coin.flip_var(i).unwrap()).collect();
    for (var, h) in indicators.iter().zip(FLIPS) {
        world.set_value(var.clone(), Value::Bool(h)).unwrap();
    }

    let mut rng = StdRng::seed_from_u64(41);
    let draws: Vec<f64> = (0..5000)
        .map(|_| resample_beta(&mut world, &coin.bias_var(), prior, &indicators, &mut rng).unwrap())
        .collect();
    assert_eq!(world.value(&coin.bias_var()), draws.last().map(|x| Value::Real(*x)).as_ref());

    #[allow(clippy::cast_precision_loss)]
    let n = draws.len() as f64;
    let mean = draws.iter().sum::<f64>() / n;
    let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    // Beta(9, 5): mean 9/14, variance 45 / (14^2 * 15).
    assert!((mean - 9.0 / 14.0).abs() < 0.01, "mean={mean}");
    assert!((var - 45.0 / (196.0 * 15.0)).abs() < 0.002, "var={var}");
}
