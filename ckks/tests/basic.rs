use ckks::{Ciphertext, Client, Complex64, Context, EvkMap, LeveledValue, Parameter, ParameterLiteral, Plaintext};
use sampling::Source;

const TOLERANCE: f64 = 1e-3;

fn literal() -> ParameterLiteral {
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

/// Two terminal primes carried at every level, sitting ahead of the main
/// chain in each basis.
fn literal_ter() -> ParameterLiteral {
    ParameterLiteral {
        log_degree: 10,
        base_scale: (1u64 << 40) as f64,
        default_encryption_level: 2,
        level_config: vec![(1, 2), (2, 2), (3, 2)],
        main_primes: vec![35184372121601, 1099511799809, 1099511922689],
        ter_primes: vec![1099512004609, 1099512094721],
        aux_primes: vec![1125899906949121, 1125899906990081],
        additional_base: (0, 0),
        dense_hamming_weight: 128,
        sparse_hamming_weight: 32,
        use_sse: false,
    }
}

fn literal_u32() -> ParameterLiteral {
    ParameterLiteral {
        log_degree: 10,
        base_scale: (1u64 << 29) as f64,
        default_encryption_level: 2,
        level_config: vec![(1, 0), (2, 0), (3, 0)],
        main_primes: vec![536903681, 536952833, 536977409],
        ter_primes: vec![],
        aux_primes: vec![1073692673, 1073668097],
        additional_base: (0, 0),
        dense_hamming_weight: 64,
        sparse_hamming_weight: 32,
        use_sse: false,
    }
}

fn random_message(source: &mut Source, n: usize) -> Vec<Complex64> {
    (0..n)
        .map(|_| Complex64::new(source.next_f64(-1.0, 1.0), source.next_f64(-1.0, 1.0)))
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
fn encode_decode_roundtrip_every_level() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut source = Source::new([7u8; 32]);
    for level in 0..=ctx.param().max_level() {
        let msg = random_message(&mut source, 512);
        let mut ptxt = Plaintext::empty();
        ctx.encode(&mut ptxt, level, ctx.param().scale(level), &msg);
        let mut back = Vec::new();
        ctx.decode(&mut back, &ptxt);
        assert_close(&back, &msg, 1e-6);
    }
}

#[test]
fn encrypt_decrypt_roundtrip() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [1u8; 32]);
    let mut source = Source::new([8u8; 32]);
    for level in [0, 2, ctx.param().max_level()] {
        let msg = random_message(&mut source, 512);
        let mut ct = Ciphertext::empty();
        client.encrypt_msg(&ctx, &mut ct, &msg, level);
        let back = client.decrypt_msg(&ctx, &ct);
        assert_close(&back, &msg, 1e-6);
    }
}

#[test]
fn ciphertext_addition_and_negation() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [2u8; 32]);
    let mut source = Source::new([9u8; 32]);
    let m1 = random_message(&mut source, 512);
    let m2 = random_message(&mut source, 512);
    let level = 3;
    let (mut c1, mut c2) = (Ciphertext::empty(), Ciphertext::empty());
    client.encrypt_msg(&ctx, &mut c1, &m1, level);
    client.encrypt_msg(&ctx, &mut c2, &m2, level);

    let mut sum = Ciphertext::empty();
    ctx.add(&mut sum, &c1, &c2);
    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| a + b).collect();
    assert_close(&client.decrypt_msg(&ctx, &sum), &want, 1e-6);

    let mut diff = Ciphertext::empty();
    ctx.sub(&mut diff, &c1, &c2);
    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| a - b).collect();
    assert_close(&client.decrypt_msg(&ctx, &diff), &want, 1e-6);

    let mut neg = Ciphertext::empty();
    ctx.neg(&mut neg, &c1);
    let want: Vec<Complex64> = m1.iter().map(|a| -a).collect();
    assert_close(&client.decrypt_msg(&ctx, &neg), &want, 1e-6);
}

#[test]
fn plaintext_and_constant_arithmetic() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [3u8; 32]);
    let mut source = Source::new([10u8; 32]);
    let m1 = random_message(&mut source, 512);
    let m2 = random_message(&mut source, 512);
    let level = 4;
    let scale = ctx.param().scale(level);

    let mut ct = Ciphertext::empty();
    client.encrypt_msg(&ctx, &mut ct, &m1, level);
    let mut pt = Plaintext::empty();
    ctx.encode(&mut pt, level, scale, &m2);

    let mut res = Ciphertext::empty();
    ctx.add_pt(&mut res, &ct, &pt);
    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| a + b).collect();
    assert_close(&client.decrypt_msg(&ctx, &res), &want, 1e-6);

    ctx.sub_opposite_pt(&mut res, &ct, &pt);
    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| b - a).collect();
    assert_close(&client.decrypt_msg(&ctx, &res), &want, 1e-6);

    let mut c = ckks::Constant::empty();
    ctx.encode_constant(&mut c, level, scale, 0.75);
    ctx.add_const(&mut res, &ct, &c);
    let want: Vec<Complex64> = m1.iter().map(|a| a + 0.75).collect();
    assert_close(&client.decrypt_msg(&ctx, &res), &want, 1e-6);

    ctx.sub_opposite_const(&mut res, &ct, &c);
    let want: Vec<Complex64> = m1.iter().map(|a| 0.75 - a).collect();
    assert_close(&client.decrypt_msg(&ctx, &res), &want, 1e-6);
}

#[test]
fn plaintext_multiplication_with_rescale() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [4u8; 32]);
    let mut source = Source::new([11u8; 32]);
    let m1 = random_message(&mut source, 512);
    let m2 = random_message(&mut source, 512);
    let level = 4;
    let scale = ctx.param().scale(level);

    let mut ct = Ciphertext::empty();
    client.encrypt_msg(&ctx, &mut ct, &m1, level);
    let mut pt = Plaintext::empty();
    ctx.encode(&mut pt, level, scale, &m2);

    let mut prod = Ciphertext::empty();
    ctx.mult_pt(&mut prod, &ct, &pt);
    let mut dropped = Ciphertext::empty();
    ctx.rescale(&mut dropped, &prod);
    assert_eq!(ctx.level_of(&dropped), level - 1);
    ctx.assert_same_scale(dropped.scale(), ctx.param().scale(level - 1));

    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| a * b).collect();
    assert_close(&client.decrypt_msg(&ctx, &dropped), &want, TOLERANCE);
}

#[test]
fn constant_multiplication() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [5u8; 32]);
    let mut source = Source::new([12u8; 32]);
    let m1 = random_message(&mut source, 512);
    let level = 3;

    let mut ct = Ciphertext::empty();
    client.encrypt_msg(&ctx, &mut ct, &m1, level);
    let mut c = ckks::Constant::empty();
    ctx.encode_constant(&mut c, level, ctx.param().scale(level), -0.5);

    let mut prod = Ciphertext::empty();
    ctx.mult_const(&mut prod, &ct, &c);
    let mut dropped = Ciphertext::empty();
    ctx.rescale(&mut dropped, &prod);
    let want: Vec<Complex64> = m1.iter().map(|a| a * -0.5).collect();
    assert_close(&client.decrypt_msg(&ctx, &dropped), &want, TOLERANCE);
}

#[test]
fn imaginary_unit_multiplication() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [6u8; 32]);
    let mut source = Source::new([13u8; 32]);
    let m1 = random_message(&mut source, 512);

    let mut ct = Ciphertext::empty();
    client.encrypt_msg(&ctx, &mut ct, &m1, 2);
    let mut res = Ciphertext::empty();
    ctx.mult_imaginary_unit(&mut res, &ct);
    let want: Vec<Complex64> = m1.iter().map(|a| a * Complex64::new(0.0, 1.0)).collect();
    assert_close(&client.decrypt_msg(&ctx, &res), &want, 1e-6);
}

#[test]
fn ciphertext_multiplication() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [7u8; 32]);
    let mut evk_map = EvkMap::new();
    client.prepare_multiplication_key(&ctx, &mut evk_map);
    let mut source = Source::new([14u8; 32]);
    let m1 = random_message(&mut source, 512);
    let m2 = random_message(&mut source, 512);
    let level = 4;

    let (mut c1, mut c2) = (Ciphertext::empty(), Ciphertext::empty());
    client.encrypt_msg(&ctx, &mut c1, &m1, level);
    client.encrypt_msg(&ctx, &mut c2, &m2, level);
    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| a * b).collect();

    let mut prod = Ciphertext::empty();
    ctx.hmult(&mut prod, &c1, &c2, evk_map.multiplication_key());
    let mut two_step = Ciphertext::empty();
    ctx.rescale(&mut two_step, &prod);
    assert_close(&client.decrypt_msg(&ctx, &two_step), &want, TOLERANCE);

    // Fused relinearize-and-rescale lands on the same value.
    let mut fused = Ciphertext::empty();
    ctx.hmult_rescale(&mut fused, &c1, &c2, evk_map.multiplication_key());
    assert_eq!(ctx.level_of(&fused), level - 1);
    assert_close(&client.decrypt_msg(&ctx, &fused), &want, TOLERANCE);

    let a = client.decrypt_msg(&ctx, &two_step);
    let b = client.decrypt_msg(&ctx, &fused);
    assert_close(&a, &b, 1e-6);
}

#[test]
fn cross_level_multiplication() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [8u8; 32]);
    let mut evk_map = EvkMap::new();
    client.prepare_multiplication_key(&ctx, &mut evk_map);
    let mut source = Source::new([15u8; 32]);
    let m1 = random_message(&mut source, 512);
    let m2 = random_message(&mut source, 512);

    assert!(ctx.is_mult_unsafe_compatible(3, 2));
    let (mut c1, mut c2) = (Ciphertext::empty(), Ciphertext::empty());
    client.encrypt_msg(&ctx, &mut c1, &m1, 3);
    client.encrypt_msg(&ctx, &mut c2, &m2, 2);

    let mut prod = Ciphertext::empty();
    ctx.mult_unsafe(&mut prod, &c1, &c2);
    // accumulating the same product again must exactly double the result
    ctx.mad_unsafe(&mut prod, &c1, &c2);
    let mut res = Ciphertext::empty();
    ctx.relinearize(&mut res, &prod, evk_map.multiplication_key());
    assert_eq!(ctx.level_of(&res), 2);
    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| a * b * 2.0).collect();
    assert_close(&client.decrypt_msg(&ctx, &res), &want, TOLERANCE);
}

#[test]
fn slot_rotation_and_conjugation() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [9u8; 32]);
    let mut evk_map = EvkMap::new();
    client.prepare_conjugation_key(&ctx, &mut evk_map);
    for dist in [1usize, 3, 100] {
        client.prepare_rotation_key(&ctx, &mut evk_map, dist);
    }
    let mut source = Source::new([16u8; 32]);
    let n = 512;
    let msg = random_message(&mut source, n);

    let mut ct = Ciphertext::empty();
    client.encrypt_msg(&ctx, &mut ct, &msg, 3);

    for dist in [1usize, 3, 100] {
        let mut rot = Ciphertext::empty();
        ctx.hrot(&mut rot, &ct, evk_map.rotation_key(dist as i64), dist);
        let want: Vec<Complex64> = (0..n).map(|i| msg[(i + dist) % n]).collect();
        assert_close(&client.decrypt_msg(&ctx, &rot), &want, TOLERANCE);
    }

    let mut conj = Ciphertext::empty();
    ctx.hconj(&mut conj, &ct, evk_map.conjugation_key());
    let want: Vec<Complex64> = msg.iter().map(|a| a.conj()).collect();
    assert_close(&client.decrypt_msg(&ctx, &conj), &want, TOLERANCE);
}

#[test]
fn level_down_preserves_value() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [10u8; 32]);
    let mut source = Source::new([17u8; 32]);
    let msg = random_message(&mut source, 512);

    let mut ct = Ciphertext::empty();
    client.encrypt_msg(&ctx, &mut ct, &msg, ctx.param().max_level());
    let mut low = Ciphertext::empty();
    ctx.level_down(&mut low, &ct, 1);
    assert_eq!(ctx.level_of(&low), 1);
    ctx.assert_same_scale(low.scale(), ctx.param().scale(1));
    assert_close(&client.decrypt_msg(&ctx, &low), &msg, TOLERANCE);
}

#[test]
fn accumulating_plaintext_product() {
    let ctx = Context::new(Parameter::<u64>::new(&literal()));
    let mut client = Client::new_seed(&ctx, [11u8; 32]);
    let mut source = Source::new([18u8; 32]);
    let m1 = random_message(&mut source, 512);
    let m2 = random_message(&mut source, 512);
    let m3 = random_message(&mut source, 512);
    let level = 3;
    let scale = ctx.param().scale(level);

    let (mut c1, mut c2) = (Ciphertext::empty(), Ciphertext::empty());
    client.encrypt_msg(&ctx, &mut c1, &m1, level);
    client.encrypt_msg(&ctx, &mut c2, &m2, level);
    let mut pt = Plaintext::empty();
    ctx.encode(&mut pt, level, scale, &m3);

    let mut acc = Ciphertext::empty();
    ctx.mult_pt(&mut acc, &c1, &pt);
    ctx.mad_pt(&mut acc, &c2, &pt);
    let want: Vec<Complex64> = (0..512).map(|i| (m1[i] + m2[i]) * m3[i]).collect();
    let mut dropped = Ciphertext::empty();
    ctx.rescale(&mut dropped, &acc);
    assert_close(&client.decrypt_msg(&ctx, &dropped), &want, TOLERANCE);
}

#[test]
fn terminal_primes_in_every_basis() {
    let ctx = Context::new(Parameter::<u64>::new(&literal_ter()));
    let mut client = Client::new_seed(&ctx, [13u8; 32]);
    let mut evk_map = EvkMap::new();
    client.prepare_multiplication_key(&ctx, &mut evk_map);
    client.prepare_rotation_key(&ctx, &mut evk_map, 5);
    let mut source = Source::new([20u8; 32]);
    let m1 = random_message(&mut source, 512);
    let m2 = random_message(&mut source, 512);

    for level in 0..=ctx.param().max_level() {
        assert_eq!(ctx.param().num_ter(level), 2);
        let mut ct = Ciphertext::empty();
        client.encrypt_msg(&ctx, &mut ct, &m1, level);
        assert_close(&client.decrypt_msg(&ctx, &ct), &m1, 1e-6);
    }

    let level = 2;
    let (mut c1, mut c2) = (Ciphertext::empty(), Ciphertext::empty());
    client.encrypt_msg(&ctx, &mut c1, &m1, level);
    client.encrypt_msg(&ctx, &mut c2, &m2, level);
    let mut prod = Ciphertext::empty();
    ctx.hmult_rescale(&mut prod, &c1, &c2, evk_map.multiplication_key());
    assert_eq!(ctx.level_of(&prod), level - 1);
    ctx.assert_same_scale(prod.scale(), ctx.param().scale(level - 1));
    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| a * b).collect();
    assert_close(&client.decrypt_msg(&ctx, &prod), &want, TOLERANCE);

    let mut rot = Ciphertext::empty();
    ctx.hrot(&mut rot, &c1, evk_map.rotation_key(5), 5);
    let want: Vec<Complex64> = (0..512).map(|i| m1[(i + 5) % 512]).collect();
    assert_close(&client.decrypt_msg(&ctx, &rot), &want, TOLERANCE);
}

#[test]
fn narrow_word_parameter_set() {
    let ctx = Context::new(Parameter::<u32>::new(&literal_u32()));
    let mut client = Client::new_seed(&ctx, [12u8; 32]);
    let mut source = Source::new([19u8; 32]);
    let m1 = random_message(&mut source, 256);
    let m2 = random_message(&mut source, 256);
    let level = 2;

    let mut ct = Ciphertext::empty();
    client.encrypt_msg(&ctx, &mut ct, &m1, level);
    assert_close(&client.decrypt_msg(&ctx, &ct), &m1, 1e-4);

    let mut pt = Plaintext::empty();
    ctx.encode(&mut pt, level, ctx.param().scale(level), &m2);
    let mut prod = Ciphertext::empty();
    ctx.mult_pt(&mut prod, &ct, &pt);
    let mut dropped = Ciphertext::empty();
    ctx.rescale(&mut dropped, &prod);
    let want: Vec<Complex64> = m1.iter().zip(&m2).map(|(a, b)| a * b).collect();
    assert_close(&client.decrypt_msg(&ctx, &dropped), &want, 1e-2);
}
