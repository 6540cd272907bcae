use boot::{BootContext, BootParameter, EvalPoly, LinearTransform, StripedMatrix};
use ckks::{
    Ciphertext, Client, Complex64, Context, EvkMap, EvkRequest, Parameter, ParameterLiteral,
};
use sampling::Source;

fn leveled_literal() -> ParameterLiteral {
    ParameterLiteral {
        log_degree: 10,
        base_scale: (1u64 << 40) as f64,
        default_encryption_level: 5,
        level_config: (0..6).map(|l| (l + 1, 0)).collect(),
        main_primes: vec![
            35184372121601,
            1099511799809,
            1099511922689,
            1099512004609,
            1099512094721,
            1099512266753,
        ],
        ter_primes: vec![],
        aux_primes: vec![1125899906949121, 1125899906990081],
        additional_base: (0, 0),
        dense_hamming_weight: 128,
        sparse_hamming_weight: 32,
        use_sse: false,
    }
}

/// Deep prime chain sized for a full bootstrap with one level to spare
/// at the bottom; the base prime tracks base_scale * 2^lmr.
fn boot_literal() -> ParameterLiteral {
    ParameterLiteral {
        log_degree: 9,
        base_scale: (1u64 << 40) as f64,
        default_encryption_level: 1,
        level_config: (0..16).map(|l| (l + 1, 0)).collect(),
        main_primes: vec![
            35184372121601,
            1099511799809,
            1099511922689,
            1099512004609,
            1099512094721,
            1099512266753,
            1099512291329,
            1099512299521,
            1099512365057,
            1099512373249,
            1099512422401,
            1099512815617,
            1099512856577,
            1099512881153,
            1099512913921,
            1099512938497,
        ],
        ter_primes: vec![],
        aux_primes: vec![1125899906949121, 1125899906990081, 1125899907063809],
        additional_base: (0, 0),
        dense_hamming_weight: 32,
        sparse_hamming_weight: 16,
        use_sse: true,
    }
}

fn random_message(source: &mut Source, n: usize, bound: f64) -> Vec<Complex64> {
    (0..n)
        .map(|_| {
            Complex64::new(
                source.next_f64(-bound, bound),
                source.next_f64(-bound, bound),
            )
        })
        .collect()
}

fn assert_close(got: &[Complex64], want: &[Complex64], tolerance: f64) {
    assert_eq!(got.len(), want.len());
    for (i, (g, w)) in got.iter().zip(want.iter()).enumerate() {
        assert!(
            (g - w).norm() < tolerance,
            "slot {}: got {} want {}",
            i,
            g,
            w
        );
    }
}

#[test]
fn chebyshev_evaluation_matches_plain() {
    let ctx = Context::new(Parameter::<u64>::new(&leveled_literal()));
    let mut client = Client::new_seed(&ctx, [31u8; 32]);
    let mut evk_map = EvkMap::new();
    client.prepare_multiplication_key(&ctx, &mut evk_map);

    let coeffs = vec![0.25, -0.5, 0.3, 0.8, 0.0, -0.2, 0.1, 0.05];
    let poly = EvalPoly::compile(&coeffs, 4);

    let n = ctx.param().num_slots_max();
    let mut source = Source::new([32u8; 32]);
    let msg: Vec<Complex64> = (0..n)
        .map(|_| Complex64::new(source.next_f64(-1.0, 1.0), 0.0))
        .collect();
    let mut ct = Ciphertext::empty();
    client.encrypt_msg(&ctx, &mut ct, &msg, 5);

    let res = poly.evaluate(&ctx, &evk_map, &ct);
    assert_eq!(ctx.level_of(&res), 5 - poly.depth() as i32);
    let got = client.decrypt_msg(&ctx, &res);
    for (g, m) in got.iter().zip(msg.iter()) {
        let want = poly.plain_evaluate(m.re);
        assert!((g.re - want).abs() < 1e-3, "got {} want {}", g.re, want);
    }
}

#[test]
fn striped_matrix_transform_matches_plain() {
    let ctx = Context::new(Parameter::<u64>::new(&leveled_literal()));
    let mut client = Client::new_seed(&ctx, [33u8; 32]);
    let mut source = Source::new([34u8; 32]);

    let n = ctx.param().num_slots_max();
    let mut matrix = StripedMatrix::new(n);
    for d in [0usize, 1, 5, 11] {
        let diag = (0..n)
            .map(|_| Complex64::new(source.next_f64(-1.0, 1.0), source.next_f64(-1.0, 1.0)))
            .collect();
        matrix.set_diag(d, diag);
    }
    let level = 2;
    let plan = LinearTransform::new(&ctx, &matrix, level);

    let msg = random_message(&mut source, n, 1.0);
    let want = matrix.apply(&msg);

    for min_ks in [false, true] {
        let mut req = EvkRequest::new();
        plan.rotations(min_ks, &mut req);
        let mut evk_map = EvkMap::new();
        client.prepare_rotation_keys(&ctx, &mut evk_map, &req);

        let mut ct = Ciphertext::empty();
        client.encrypt_msg(&ctx, &mut ct, &msg, level);
        let res = plan.evaluate(&ctx, &evk_map, &ct, min_ks);
        assert_eq!(ctx.level_of(&res), level - 1);
        let got = client.decrypt_msg(&ctx, &res);
        assert_close(&got, &want, 1e-3);
    }
}

fn run_bootstrap(min_ks: bool) {
    let bp = BootParameter::default();
    let mut bc = BootContext::new(Parameter::<u64>::new(&boot_literal()), bp);
    bc.set_min_ks(min_ks);
    let n = bc.ctx().param().num_slots_max();
    bc.prepare_special_fft(n);

    let mut client = Client::new_seed(bc.ctx(), [41u8; 32]);
    let mut evk_map = EvkMap::new();
    client.prepare_multiplication_key(bc.ctx(), &mut evk_map);
    client.prepare_conjugation_key(bc.ctx(), &mut evk_map);
    client.prepare_dense_to_sparse_key(bc.ctx(), &mut evk_map);
    client.prepare_sparse_to_dense_key(bc.ctx(), &mut evk_map);
    let mut req = EvkRequest::new();
    bc.add_required_rotations(n, &mut req);
    client.prepare_rotation_keys(bc.ctx(), &mut evk_map, &req);

    let mut source = Source::new([42u8; 32]);
    let msg = random_message(&mut source, n, 0.4);
    let mut ct = Ciphertext::empty();
    client.encrypt_msg(bc.ctx(), &mut ct, &msg, 1);

    let mut res = Ciphertext::empty();
    bc.boot(&evk_map, &mut res, &ct);
    assert_eq!(
        bc.ctx().level_of(&res),
        bc.ctx().param().max_level() - bc.boot_parameter().total_depth() as i32
    );
    let got = client.decrypt_msg(bc.ctx(), &res);
    assert_close(&got, &msg, 1e-2);
}

#[test]
fn bootstrap_recovers_message() {
    run_bootstrap(false);
}

#[test]
fn bootstrap_with_two_rotation_keys() {
    run_bootstrap(true);
}

#[test]
#[should_panic(expected = "exceeds base_scale")]
fn rejects_base_scale_far_below_the_base_prime() {
    // A 2^25 scale under a 2^45 base prime leaves the reduced signal
    // below the approximation noise.
    let mut lit = boot_literal();
    lit.base_scale = (1u64 << 25) as f64;
    BootContext::new(Parameter::<u64>::new(&lit), BootParameter::default());
}
