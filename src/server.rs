use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;

use crate::config::Config;
use crate::dispatch::registry::Registry;
use crate::error::CodesmithError;
use crate::generate::{Generator, collect_stream};
use crate::parsers::{self, ParsedFile};
use crate::project::ProjectStore;
use crate::project::service::ProjectService;
use crate::project::store::MemoryStore;
use crate::response::{ToolMetadata, ToolResponse};
use crate::tools::generate::GenerateCodeRequest;
use crate::tools::project::{
    CreateProjectRequest, DeleteProjectRequest, GenerationHistoryRequest, GetProjectRequest,
    ListProjectsRequest, UpdateFileRequest,
};
use crate::tools::providers::ProvidersResponse;
use crate::validation::{validate_id, validate_prompt};

/// Result of `generate_code_stream` once the fragments are drained.
#[derive(Debug, Serialize)]
struct StreamedCode {
    code: String,
    files: Vec<ParsedFile>,
    fragments: usize,
}

#[derive(Debug, Serialize)]
struct Deleted<'a> {
    deleted: &'a str,
}

#[derive(Clone)]
pub struct CodesmithServer {
    registry: Arc<Registry>,
    generator: Arc<Generator>,
    projects: Arc<ProjectService>,
    max_prompt_chars: usize,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CodesmithServer {
    pub fn new(config: Config) -> Result<Self, CodesmithError> {
        let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
        Self::with_store(config, store)
    }

    /// Same as `new`, with a caller-supplied project store.
    pub fn with_store(
        config: Config,
        store: Arc<dyn ProjectStore>,
    ) -> Result<Self, CodesmithError> {
        let registry = Arc::new(Registry::from_config(&config)?);
        let generator = Arc::new(Generator::new(registry.clone(), &config.generation));
        let projects = Arc::new(ProjectService::new(generator.clone(), store));

        let usable = registry.available_providers();
        if usable.is_empty() {
            tracing::warn!("no provider has an API key; generation tools will fail");
        } else {
            tracing::info!("usable providers: {usable:?}");
        }

        Ok(Self {
            registry,
            generator,
            projects,
            max_prompt_chars: config.generation.max_prompt_chars,
            tool_router: Self::tool_router(),
        })
    }

    fn prompt_rejection(&self, tool_name: &str, prompt: &str) -> Option<CallToolResult> {
        validate_prompt(prompt, self.max_prompt_chars)
            .err()
            .map(|msg| rejected(tool_name, msg))
    }

    #[tool(
        name = "generate_code",
        description = "Generate a web app (HTML/CSS/JS) from a plain-language prompt. Returns the raw completion, the files parsed out of its fenced code blocks, an explanation, and usage metadata. Use `list_providers` for provider and model names.",
        annotations(read_only_hint = true)
    )]
    async fn generate_code(
        &self,
        Parameters(req): Parameters<GenerateCodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(rejection) = self.prompt_rejection("generate_code", &req.prompt) {
            return Ok(rejection);
        }
        let start = Instant::now();

        let response = match self.generator.generate_code(&req).await {
            Ok(generated) => {
                let metadata = ToolMetadata::new("generate_code", start.elapsed().as_secs_f64())
                    .with_model(
                        generated.metadata.model.clone(),
                        generated.metadata.provider.clone(),
                    );
                ToolResponse::json(&generated, metadata)
            }
            Err(e) => self.failure("generate_code", &req, e, start),
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "generate_code_stream",
        description = "Generate code using the provider's streaming API. Fragments are collected as they arrive and returned together with the parsed files and the fragment count.",
        annotations(read_only_hint = true)
    )]
    async fn generate_code_stream(
        &self,
        Parameters(req): Parameters<GenerateCodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(rejection) = self.prompt_rejection("generate_code_stream", &req.prompt) {
            return Ok(rejection);
        }
        let start = Instant::now();

        let outcome = match self.generator.generate_code_stream(&req).await {
            Ok(stream) => collect_stream(stream).await,
            Err(e) => Err(e),
        };

        let response = match outcome {
            Ok((code, fragments)) => {
                let files = parsers::parse_generated_code(&code);
                let (model, provider) = self.resolved_model(&req);
                let metadata =
                    ToolMetadata::new("generate_code_stream", start.elapsed().as_secs_f64())
                        .with_model(model, provider);
                ToolResponse::json(
                    &StreamedCode {
                        code,
                        files,
                        fragments,
                    },
                    metadata,
                )
            }
            Err(e) => self.failure("generate_code_stream", &req, e, start),
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "list_providers",
        description = "List providers with a configured API key, the default provider, and the models each provider offers.",
        annotations(read_only_hint = true)
    )]
    async fn list_providers(&self) -> Result<CallToolResult, McpError> {
        let payload = ProvidersResponse::from(self.registry.as_ref());
        let response = ToolResponse::json(&payload, ToolMetadata::new("list_providers", 0.0));
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "create_project",
        description = "Generate code for a prompt and save the result as a project owned by `user_id`. Returns the project (with its share id) and its files."
    )]
    async fn create_project(
        &self,
        Parameters(req): Parameters<CreateProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(rejection) = self.prompt_rejection("create_project", &req.prompt) {
            return Ok(rejection);
        }
        if let Err(msg) = validate_id("user_id", &req.user_id) {
            return Ok(rejected("create_project", msg));
        }
        let start = Instant::now();

        let response = match self.projects.create_project(&req).await {
            Ok(created) => {
                let metadata = ToolMetadata::new("create_project", start.elapsed().as_secs_f64())
                    .with_model(
                        created.generation.model.clone(),
                        created.generation.provider.clone(),
                    );
                ToolResponse::json(&created, metadata)
            }
            Err(e) => project_failure("create_project", e, start),
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "get_project",
        description = "Fetch a project and its files by share id. Pass `user_id` to learn whether the caller owns it.",
        annotations(read_only_hint = true)
    )]
    async fn get_project(
        &self,
        Parameters(req): Parameters<GetProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(msg) = validate_id("share_id", &req.share_id) {
            return Ok(rejected("get_project", msg));
        }
        let start = Instant::now();

        let response = match self
            .projects
            .get_project(&req.share_id, req.user_id.as_deref())
            .await
        {
            Ok(Some(view)) => ToolResponse::json(
                &view,
                ToolMetadata::new("get_project", start.elapsed().as_secs_f64()),
            ),
            Ok(None) => project_failure("get_project", CodesmithError::NotFound("project"), start),
            Err(e) => project_failure("get_project", e, start),
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "list_projects",
        description = "List projects owned by `user_id`, newest first.",
        annotations(read_only_hint = true)
    )]
    async fn list_projects(
        &self,
        Parameters(req): Parameters<ListProjectsRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(msg) = validate_id("user_id", &req.user_id) {
            return Ok(rejected("list_projects", msg));
        }
        let start = Instant::now();

        let response = match self
            .projects
            .list_projects(&req.user_id, req.limit(), req.offset())
            .await
        {
            Ok(projects) => ToolResponse::json(
                &projects,
                ToolMetadata::new("list_projects", start.elapsed().as_secs_f64()),
            ),
            Err(e) => project_failure("list_projects", e, start),
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "update_file",
        description = "Replace the content of one project file. Only the project owner may edit."
    )]
    async fn update_file(
        &self,
        Parameters(req): Parameters<UpdateFileRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(msg) = validate_id("file_id", &req.file_id) {
            return Ok(rejected("update_file", msg));
        }
        if let Err(msg) = validate_id("user_id", &req.user_id) {
            return Ok(rejected("update_file", msg));
        }
        let start = Instant::now();

        let response = match self
            .projects
            .update_file(&req.file_id, &req.content, &req.user_id)
            .await
        {
            Ok(file) => ToolResponse::json(
                &file,
                ToolMetadata::new("update_file", start.elapsed().as_secs_f64()),
            ),
            Err(e) => project_failure("update_file", e, start),
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "delete_project",
        description = "Delete a project and all of its files. Only the project owner may delete.",
        annotations(destructive_hint = true)
    )]
    async fn delete_project(
        &self,
        Parameters(req): Parameters<DeleteProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(msg) = validate_id("project_id", &req.project_id) {
            return Ok(rejected("delete_project", msg));
        }
        if let Err(msg) = validate_id("user_id", &req.user_id) {
            return Ok(rejected("delete_project", msg));
        }
        let start = Instant::now();

        let response = match self
            .projects
            .delete_project(&req.project_id, &req.user_id)
            .await
        {
            Ok(()) => ToolResponse::json(
                &Deleted {
                    deleted: &req.project_id,
                },
                ToolMetadata::new("delete_project", start.elapsed().as_secs_f64()),
            ),
            Err(e) => project_failure("delete_project", e, start),
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "get_generation_history",
        description = "List the generation runs recorded for a project, newest first, with token and timing stats. Only the project owner may read it.",
        annotations(read_only_hint = true)
    )]
    async fn get_generation_history(
        &self,
        Parameters(req): Parameters<GenerationHistoryRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(msg) = validate_id("project_id", &req.project_id) {
            return Ok(rejected("get_generation_history", msg));
        }
        if let Err(msg) = validate_id("user_id", &req.user_id) {
            return Ok(rejected("get_generation_history", msg));
        }
        let start = Instant::now();

        let response = match self
            .projects
            .generation_history(&req.project_id, &req.user_id)
            .await
        {
            Ok(history) => ToolResponse::json(
                &history,
                ToolMetadata::new("get_generation_history", start.elapsed().as_secs_f64()),
            ),
            Err(e) => project_failure("get_generation_history", e, start),
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "generation_stats",
        description = "Totals across every recorded generation: run count, tokens used and average generation time in milliseconds.",
        annotations(read_only_hint = true)
    )]
    async fn generation_stats(&self) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let response = match self.projects.generation_stats().await {
            Ok(stats) => ToolResponse::json(
                &stats,
                ToolMetadata::new("generation_stats", start.elapsed().as_secs_f64()),
            ),
            Err(e) => project_failure("generation_stats", e, start),
        };
        Ok(response.into_call_tool_result())
    }

    /// Model and provider a request is routed to, for response metadata.
    /// Falls back to the requested names when the provider cannot be built.
    fn resolved_model(&self, req: &GenerateCodeRequest) -> (String, String) {
        let requested = req.provider.as_deref().filter(|p| !p.trim().is_empty());
        match self.registry.get_provider(requested) {
            Ok(provider) => (
                provider.model_for(req.model.as_deref()),
                provider.name().to_string(),
            ),
            Err(_) => (
                req.model.clone().unwrap_or_else(|| "default".to_string()),
                requested
                    .unwrap_or_else(|| self.registry.default_provider())
                    .to_string(),
            ),
        }
    }

    fn failure(
        &self,
        tool_name: &str,
        req: &GenerateCodeRequest,
        e: CodesmithError,
        start: Instant,
    ) -> ToolResponse {
        tracing::warn!("{tool_name} failed: {e}");
        let (model, routed) = self.resolved_model(req);
        let provider = e.provider().map_or(routed, str::to_string);
        ToolResponse::error(
            e.user_message(),
            ToolMetadata::new(tool_name, start.elapsed().as_secs_f64()).with_model(model, provider),
        )
    }
}

/// Input rejected before any work was done.
fn rejected(tool_name: &str, message: String) -> CallToolResult {
    tracing::info!("{tool_name} rejected: {message}");
    ToolResponse::error(message, ToolMetadata::new(tool_name, 0.0)).into_call_tool_result()
}

fn project_failure(tool_name: &str, e: CodesmithError, start: Instant) -> ToolResponse {
    if e.is_client_error() {
        tracing::info!("{tool_name} rejected: {e}");
    } else {
        tracing::warn!("{tool_name} failed: {e}");
    }
    ToolResponse::error(
        e.user_message(),
        ToolMetadata::new(tool_name, start.elapsed().as_secs_f64()),
    )
}

#[tool_handler]
impl ServerHandler for CodesmithServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "codesmith".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Codesmith: prompt-to-web-app code generation over OpenRouter, Anthropic and OpenAI.\n\n\
                 1. Call `list_providers` to see which providers have keys and which models they offer.\n\
                 2. Call `generate_code` (or `generate_code_stream`) with a prompt and optional context.\n\
                    Files are parsed from fenced blocks like ```html // index.html.\n\
                 3. To keep the result, call `create_project` with a `user_id`; share the returned `share_id`.\n\
                 4. `get_project`, `list_projects`, `update_file` and `delete_project` manage saved projects.\n\
                    Only the owning user may edit or delete.\n\
                 5. `get_generation_history` and `generation_stats` report recorded generation runs."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
