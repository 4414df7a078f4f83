use bytes::Bytes;
use http::{Method, Request};
use http_body_util::BodyExt;
use micro_controller::{
    Action, ActionContext, ActionError, Controller, ControllerDef, FilterReply, MiniJinjaEngine, Recovery, Renderer, Site,
    UrlArgs,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Debug)]
struct NewTodo {
    title: String,
}

#[derive(Default)]
struct TodoController {
    owner: String,
}

impl TodoController {
    fn index(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
        Ok(json!({"todos": ["write docs", "ship it"]}))
    }

    fn show(&mut self, ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
        let id: u32 = ctx.param("id").unwrap_or_default();
        Ok(json!({"id": id, "owner": self.owner}))
    }

    // curl -v -d "title=hello" http://127.0.0.1/todo/create/
    fn create(&mut self, ctx: &mut ActionContext<'_>) -> Result<Renderer, ActionError> {
        let todo: NewTodo = ctx.request().params().map_err(ActionError::failed)?;
        ctx.flash().append(format!("created {}", todo.title), "normal");
        let location = ctx.url_for::<()>(None, None, &UrlArgs::None, None)?;
        Ok(Renderer::redirect(location))
    }

    fn fail(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
        Err(ActionError::failed("the todo list is on fire"))
    }
}

impl Controller for TodoController {
    fn define(def: ControllerDef<Self>) -> ControllerDef<Self> {
        def.action(Action::new("index", Self::index))
            .action(Action::new("show", Self::show).param::<u32>("id").auto())
            .action(Action::new("create", Self::create).methods([Method::POST]))
            .action(Action::new("fail", Self::fail))
    }

    fn before_filter(&mut self, _ctx: &mut ActionContext<'_>) -> Result<FilterReply, ActionError> {
        self.owner = "ada".to_string();
        Ok(json!({"owner": self.owner}).into())
    }

    fn on_exception(&mut self, _ctx: &mut ActionContext<'_>, error: &ActionError) -> Result<Option<Recovery>, ActionError> {
        let mut data = Map::new();
        data.insert("message".to_string(), json!(error.to_string()));
        Ok(Some(Recovery::Mapping(data)))
    }
}

async fn show(site: &Site, req: Request<Bytes>) {
    let path = req.uri().to_string();
    match site.call(req).await {
        Ok(response) => {
            let status = response.status();
            let body = response.into_body().collect().await.map(|b| b.to_bytes()).unwrap_or_default();
            info!(%path, %status, body = %String::from_utf8_lossy(&body), "response");
        }
        Err(e) => info!(%path, cause = %e, "request failed"),
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut templates = MiniJinjaEngine::new();
    templates.add_template("todo/index.html", "{{ owner }}: {{ todos | join(\", \") }}").unwrap();
    templates.add_template("error.html", "oops: {{ message }}").unwrap();

    let site = Site::builder().controller::<TodoController>().templates(templates).build().unwrap();

    let get = |uri: &str| Request::builder().uri(uri).body(Bytes::new()).unwrap();
    show(&site, get("/todo/")).await;
    show(&site, Request::builder().uri("/todo/show/7/").header("accept", "application/json").body(Bytes::new()).unwrap()).await;
    show(&site, get("/todo/show/7/")).await;
    show(&site, get("/todo/create/")).await;
    show(&site, Request::builder().method(Method::POST).uri("/todo/create/").body(Bytes::from("title=hello")).unwrap()).await;
    show(&site, get("/todo/fail/")).await;
    show(&site, get("/missing/")).await;
}
