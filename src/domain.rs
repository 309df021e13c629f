// Domain layer modules
pub mod function;
pub mod grant;
pub mod intrinsic;
pub mod logical_id;
pub mod rest_api;
pub mod stack;
pub mod stack_variant;
pub mod table;
pub mod template;

// Re-exports
pub use function::{Architecture, CodeLocation, FunctionSpec, FunctionSpecError, Runtime};
pub use grant::AccessGrant;
pub use intrinsic::Expr;
pub use logical_id::logical_id;
pub use rest_api::{LambdaIntegration, RestApiSpec};
pub use stack::{DeploymentEnvironment, Stack, StackProps};
pub use stack_variant::{StackVariant, UnknownVariantError};
pub use table::{TableSpec, TableSpecError};
pub use template::{Output, Parameter, RemovalPolicy, Resource, Template, TemplateError};
