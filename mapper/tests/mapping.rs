// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use mapper::{
    build_array, ingest_json, routing_channels, MapperConfig, Outcome, Placement, TaskClass,
};
use std::str::FromStr;

const CONFIG: &str = "---
array:
  rows: 3
  cols: 3
  topology: cardinal
  links: 2
  sites:
    - {row: 0, col: 0, kind: input_handler}
    - {row: 2, col: 2, kind: output_handler}
    - {row: 1, col: 1, kind: memory1_port}
    - {row: 0, col: 1, kind: memory_processor, rank: 1.0}
    - {row: 1, col: 0, kind: memory_processor, rank: 1.0}
placement:
  model: ranked
  penalty: 2.0
  seed: 42
  max_attempts: 5
";

const DESCRIPTION: &str = r#"{
    "tasks": [
        {"name": "src", "type": "Input"},
        {"name": "filter", "type": "Processor", "measurements": {"rank": 1.0}},
        {"name": "table", "type": "Memory"},
        {"name": "sum", "type": "Processor", "measurements": {"rank": 9.0}},
        {"name": "sink", "type": "Output"}
    ],
    "links": {
        "circuit": {
            "stream": [
                {"source_task": "src", "source_index": 0, "dest_task": "filter", "dest_index": 0},
                {"source_task": "filter", "source_index": 0, "dest_task": "sum", "dest_index": 1,
                 "measurements": {"write_count": 40.0}},
                {"source_task": "sum", "source_index": 0, "dest_task": "sink", "dest_index": 3,
                 "measurements": {"write_count": 10.0}}
            ]
        },
        "memory_request": {
            "lookup": [
                {"source_task": "filter", "source_index": 1, "dest_task": "table", "dest_index": 0}
            ]
        },
        "memory_response": {
            "lookup": [
                {"source_task": "table", "source_index": 0, "dest_task": "filter", "dest_index": 1}
            ]
        }
    }
}"#;

#[test]
fn place_and_route_pipeline() -> anyhow::Result<()> {
    let _logger = env_logger::builder().try_init();
    let config = MapperConfig::from_str(CONFIG)?;
    let graph = ingest_json(DESCRIPTION, &config.ingest)?;
    assert_eq!(
        graph.task_by_name("filter").and_then(|t| t.class()),
        Some(TaskClass::MemoryProcessor)
    );
    assert_eq!(
        graph.task_by_name("table").and_then(|t| t.class()),
        Some(TaskClass::Memory1Port)
    );

    let arch = build_array(&config.array)?;
    let mut placement = Placement::new(&graph, &arch, config.placement.cost_model())?;
    assert_eq!(placement.penalty(), 2.0);

    let mut routed_channels = Vec::new();
    // the stand-in router rejects the first attempt
    let outcome = config.placement.backoff().run(&mut placement, |p, attempt| {
        let before = p.total_cost()?;
        // a greedy improvement pass in place of the annealer
        let nodes: Vec<_> = p.graph().iter_tasks().collect();
        for &a in &nodes {
            for &b in &nodes {
                let shared = p
                    .legal_addresses(a)
                    .iter()
                    .any(|address| p.legal_addresses(b).contains(address));
                if a == b || !shared {
                    continue;
                }
                let cost = p.total_cost()?;
                p.swap(a, b);
                let legal = p.position(a).map_or(true, |x| p.can_occupy(a, x))
                    && p.position(b).map_or(true, |x| p.can_occupy(b, x));
                if !legal || p.total_cost()? > cost {
                    p.swap(a, b);
                }
            }
        }
        assert!(p.total_cost()? <= before);
        assert_eq!(p.peek_ratio(), p.max_ratio_scan());
        routed_channels = routing_channels(p)?;
        Ok(attempt > 0)
    })?;
    assert_eq!(
        outcome,
        Outcome::Routed {
            attempts: 2,
            penalty: 1.0
        }
    );

    // the packet-free description routes every link
    assert_eq!(routed_channels.len(), graph.link_count());
    let costs: Vec<f64> = routed_channels.iter().map(|c| c.cost).collect();
    assert_eq!(costs, vec![0.125, 0.125, 1.0, 5.0, 5.0]);
    for channel in &routed_channels {
        assert!(channel.start.iter().all(|pins| !pins.is_empty()));
        assert!(channel.stop.iter().all(|pins| !pins.is_empty()));
    }
    Ok(())
}
