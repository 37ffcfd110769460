mod provider;

pub use provider::{api_key_var, openai_client, RigLlm};
