use spacetensor_core::{all, eval, index, newaxis, ops, range, Host, Tensor, Threads};

fn main() -> spacetensor_core::Result<()> {
    env_logger::init();

    let a = Tensor::<f64, 2>::from_nested([[11., 12., 13.], [21., 22., 23.]])?;
    println!("a = {a:?}");

    let mut b = Tensor::<f64, 2>::new();
    b.assign(&a + &a)?;
    println!("a + a = {:?}", b.to_vec()?);

    let v = Tensor::<f64, 1>::from_nested([10., 20., 30., 40.])?;
    println!("v[1:-1] = {:?}", v.slice::<1>(&[range(1, -1)])?.to_vec());

    // Outer product of `v` with the first column of `a`, on the thread pool.
    let col = v.slice::<2>(&[all(), newaxis()])?.to_tensor().to_space::<Threads>()?;
    let row = a.slice::<1>(&[all(), index(0)])?.to_tensor().to_space::<Threads>()?;
    let row = row.slice::<2>(&[newaxis()])?;
    let outer = eval::<Threads, _, 2>(&col * row)?;
    println!("outer shape {} = {:?}", outer.shape(), outer.to_vec()?);

    let host: Tensor<f64, 2, Host> = eval(ops::sqrt(&b) - 1.0)?;
    println!("sqrt(a + a) - 1 = {:?}", host.to_vec()?);
    Ok(())
}
