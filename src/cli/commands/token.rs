use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};

pub fn run(user: Uuid) -> anyhow::Result<()> {
    let token = generate_jwt(&Claims::new(user))?;
    println!("{}", token);
    Ok(())
}
