mod test_utils;

use approx::*;
use simforce::*;
pub use test_utils::*;

#[test]
fn surface_bending_passes_consistency_checks() -> Result<(), Error> {
    init_logger();
    let (sheet, x0) = make_curved_sheet(3, 2);
    let mut bend = linear_bending_elements(&sheet, &x0, 2.0, 0.1)?;
    assert_eq!(bend.num_stencils(), sheet.bending_quadruples().len());
    let params = ForceTestParams {
        block_diagonal_sweep: true,
        ..Default::default()
    };
    let report = params.run(&mut bend, &perturbed(&x0, 51, 0.1))?;
    for check in Check::ALL {
        assert!(!report.skipped(check), "{} was skipped", check);
    }
    Ok(())
}

#[test]
fn curve_bending_passes_consistency_checks() -> Result<(), Error> {
    init_logger();
    let (curve, x0) = make_curve(5);
    let mut bend = linear_bending_elements(&curve, &x0, 1.0, 0.5)?;
    assert_eq!(bend.num_stencils(), 4);
    let params = ForceTestParams {
        block_diagonal_sweep: true,
        ..Default::default()
    };
    params.run(&mut bend, &perturbed(&x0, 52, 0.1))?;
    Ok(())
}

#[test]
fn surface_bending_needs_three_dimensions() {
    let (grid, x2) = make_grid(2, 2);
    assert!(matches!(
        linear_bending_elements(&grid, &x2, 1.0, 0.0),
        Err(Error::UnsupportedDimensions {
            ambient: 2,
            element: 2
        })
    ));
}

#[test]
fn rest_configuration_has_no_bending_energy() -> Result<(), Error> {
    let (sheet, x0) = make_curved_sheet(2, 2);
    let mut bend = linear_bending_elements(&sheet, &x0, 2.0, 0.0)?;
    bend.update_position(&x0, false)?;
    assert_relative_eq!(bend.elastic_energy(), 0.0, epsilon = 1e-20);
    let mut f = VectorField::zeros(x0.nrows(), 3);
    bend.add_elastic_force(&mut f);
    assert_relative_eq!(utils::maxabs(&f), 0.0, epsilon = 1e-10);
    Ok(())
}

#[test]
fn gravity_passes_consistency_checks() -> Result<(), Error> {
    init_logger();
    let (tets, x0) = make_two_tets();
    let fv: FiniteVolume<NeoHookean> = finite_volume(
        &tets.elements,
        1000.0,
        &x0,
        NeoHookean::new(3e6, 0.475, 0.05, 0.25),
        None,
        false,
    )?;
    let mut gravity = Gravity::new(&fv.lumped_mass(), &[0.0, -9.81, 0.0]);
    let report = ForceTestParams::default().run(&mut gravity, &perturbed(&x0, 61, 0.1))?;
    assert!(report.skipped(Check::ElasticGradientBlockDiagonal));
    assert!(!report.skipped(Check::ElasticGradient));
    Ok(())
}

/// Forces of different kinds can be tested through trait objects.
#[test]
fn boxed_forces() -> Result<(), Error> {
    init_logger();
    let (sheet, x0) = make_curved_sheet(2, 2);
    let mass = vec![1.0; x0.nrows()];
    let mut forces: Vec<Box<dyn Force>> = vec![
        Box::new(edge_springs(&sheet, &mass, &x0, 10.0, 0.2)?),
        Box::new(bending_springs(&sheet, &mass, &x0, 1.0, 0.2)?),
        Box::new(linear_bending_elements(&sheet, &x0, 1.0, 0.2)?),
        Box::new(Gravity::new(&mass, &[0.0, 0.0, -9.81])),
    ];
    let x = perturbed(&x0, 71, 0.05);
    for force in forces.iter_mut() {
        ForceTestParams::default().run(force, &x)?;
    }
    Ok(())
}
